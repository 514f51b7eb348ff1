//! Dirty pages are written back to their slots before eviction and read
//! back intact after a reload.

mod common;

use softvm_pager::PolicyKind;

fn main() {
    softvm_pager::logger::init();
    let base = softvm_pager::init(2, PolicyKind::Fifo).unwrap();

    common::write_byte(base, 0, 0, b'A');
    common::write_byte(base, 1, 0, b'B');
    assert_eq!(softvm_pager::resident_count(), 2);

    // Each of these reads evicts the oldest dirty page.
    assert_eq!(common::read_byte(base, 2, 0), 0);
    assert_eq!(common::read_byte(base, 3, 0), 0);

    assert_eq!(common::read_byte(base, 0, 0), b'A');
    assert_eq!(common::read_byte(base, 1, 0), b'B');
    assert_eq!(softvm_pager::num_loads(), 6);

    softvm_pager::cleanup().unwrap();
    println!("dirty_writeback: ok");
}
