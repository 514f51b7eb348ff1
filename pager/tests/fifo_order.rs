//! FIFO evicts by insertion order, not recency: re-touching the oldest
//! page does not save it.

mod common;

use softvm_pager::PolicyKind;

fn main() {
    softvm_pager::logger::init();
    let base = softvm_pager::init(3, PolicyKind::Fifo).unwrap();

    for page in [0, 1, 2] {
        common::read_byte(base, page, 0);
    }
    assert_eq!(softvm_pager::num_loads(), 3);

    // Re-touch page 0; under FIFO this changes nothing about its place in
    // the eviction order.
    common::read_byte(base, 0, 0);
    assert_eq!(softvm_pager::num_loads(), 3);

    // Budget full, so this evicts the head of the queue: page 0.
    common::read_byte(base, 3, 0);
    assert_eq!(softvm_pager::num_loads(), 4);

    // Pages 1 and 2 are still resident...
    common::read_byte(base, 1, 0);
    common::read_byte(base, 2, 0);
    assert_eq!(softvm_pager::num_loads(), 4);

    // ...and page 0 is not.
    common::read_byte(base, 0, 0);
    assert_eq!(softvm_pager::num_loads(), 5);

    softvm_pager::cleanup().unwrap();
    println!("fifo_order: ok");
}
