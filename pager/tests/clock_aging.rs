//! CLOCK/LRU aging: a page re-touched after an aging pass survives the
//! next eviction; the least-recently-accessed page goes instead.

mod common;

use softvm_pager::PolicyKind;

fn main() {
    softvm_pager::logger::init();
    let base = softvm_pager::init(3, PolicyKind::Clock).unwrap();

    for page in [0, 1, 2] {
        common::read_byte(base, page, 0);
    }
    assert_eq!(softvm_pager::num_loads(), 3);

    // Let the aging pass demote all three, then re-touch only page 0 and
    // let another pass move it to the back of the queue.
    common::sleep_ticks();
    common::read_byte(base, 0, 0);
    common::sleep_ticks();

    // Budget full: the victim must be page 1, the head of the aged queue,
    // not the recently touched page 0.
    common::read_byte(base, 3, 0);
    assert_eq!(softvm_pager::num_loads(), 4);

    common::read_byte(base, 0, 0);
    assert_eq!(
        softvm_pager::num_loads(),
        4,
        "recently accessed page 0 must have survived the eviction"
    );
    common::read_byte(base, 2, 0);
    assert_eq!(softvm_pager::num_loads(), 4);

    common::read_byte(base, 1, 0);
    assert_eq!(
        softvm_pager::num_loads(),
        5,
        "page 1 must have been the eviction victim"
    );

    softvm_pager::cleanup().unwrap();
    println!("clock_aging: ok");
}
