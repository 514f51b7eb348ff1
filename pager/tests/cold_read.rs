//! Cold read: a fresh page loads as zeros with exactly one load and two
//! faults (the no-mapping fault, then the read up-level fault).

mod common;

use softvm_pager::{PolicyKind, NUM_PAGES, VMEM_BYTES};

fn main() {
    softvm_pager::logger::init();
    let base = softvm_pager::init(NUM_PAGES, PolicyKind::Fifo).unwrap();

    assert_eq!(softvm_pager::vmem_start(), base as usize);
    assert_eq!(softvm_pager::vmem_end(), base as usize + VMEM_BYTES);
    assert_eq!(softvm_pager::num_faults(), 0);
    assert_eq!(softvm_pager::num_loads(), 0);

    let value = common::read_byte(base, 7, 0);

    assert_eq!(value, 0, "fresh pages must read as zero");
    assert_eq!(softvm_pager::num_loads(), 1);
    assert_eq!(softvm_pager::num_faults(), 2);
    assert_eq!(softvm_pager::resident_count(), 1);

    softvm_pager::cleanup().unwrap();
    println!("cold_read: ok");
}
