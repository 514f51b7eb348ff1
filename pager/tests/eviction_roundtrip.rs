//! Every page gets a distinct pattern, is forced out through the store at
//! least once, and comes back bit-identical. Also pins down the exact
//! fault and load arithmetic of the permission ladder under FIFO.

mod common;

use softvm_pager::{PolicyKind, NUM_PAGES, PAGE_SIZE};

const BUDGET: usize = 4;

fn pattern(page: usize) -> u8 {
    (page as u8).wrapping_mul(31).wrapping_add(7)
}

fn main() {
    softvm_pager::logger::init();
    let base = softvm_pager::init(BUDGET, PolicyKind::Fifo).unwrap();

    for page in 0..NUM_PAGES {
        common::write_byte(base, page, 0, pattern(page));
        common::write_byte(base, page, PAGE_SIZE - 1, pattern(page) ^ 0xff);
        assert!(softvm_pager::resident_count() <= BUDGET);
    }
    // One load per page; the second write of each page is free.
    assert_eq!(softvm_pager::num_loads(), NUM_PAGES as u64);

    for page in 0..NUM_PAGES {
        assert_eq!(common::read_byte(base, page, 0), pattern(page));
        assert_eq!(
            common::read_byte(base, page, PAGE_SIZE - 1),
            pattern(page) ^ 0xff
        );
        assert!(softvm_pager::resident_count() <= BUDGET);
    }
    // The sequential sweep with a budget of 4 misses every page again.
    assert_eq!(softvm_pager::num_loads(), 2 * NUM_PAGES as u64);

    // Ladder arithmetic: a first write costs three faults (map, read
    // up-level, write up-level), a first read costs two.
    assert_eq!(softvm_pager::num_faults(), 3 * NUM_PAGES as u64 + 2 * NUM_PAGES as u64);

    softvm_pager::cleanup().unwrap();
    println!("eviction_roundtrip: ok");
}
