//! Shared helpers for the scenario binaries.
//!
//! Each scenario is its own process (the pager is one-shot per process), so
//! these helpers stick to plain volatile touches and timing.

#![allow(dead_code)]

use softvm_pager::PAGE_SIZE;

/// Address of byte `offset` within `page` of the managed range.
pub fn byte_ptr(base: *mut u8, page: usize, offset: usize) -> *mut u8 {
    assert!(offset < PAGE_SIZE);
    base.wrapping_add(page * PAGE_SIZE + offset)
}

/// Volatile store to byte `offset` of `page`.
pub fn write_byte(base: *mut u8, page: usize, offset: usize, value: u8) {
    // SAFETY: the pointer stays inside the managed range; the pager makes
    // the store behave like an ordinary memory write.
    unsafe { byte_ptr(base, page, offset).write_volatile(value) }
}

/// Volatile load of byte `offset` of `page`.
pub fn read_byte(base: *mut u8, page: usize, offset: usize) -> u8 {
    // SAFETY: as for write_byte.
    unsafe { byte_ptr(base, page, offset).read_volatile() }
}

/// Sleep long enough for at least one aging tick to fire.
pub fn sleep_ticks() {
    std::thread::sleep(std::time::Duration::from_millis(
        5 * softvm_pager::TICK_INTERVAL_MS,
    ));
}
