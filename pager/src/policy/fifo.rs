//! First-in-first-out replacement

use std::collections::VecDeque;

use super::ReplacementPolicy;
use crate::mm::PageId;

/// Evicts the page that has been resident the longest, regardless of how
/// recently it was touched. Ticks are ignored.
pub struct FifoPolicy {
    queue: VecDeque<PageId>,
}

impl FifoPolicy {
    /// Capacity is reserved up front so the signal-handler hooks never
    /// allocate.
    pub fn new(max_resident: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(max_resident),
        }
    }
}

impl ReplacementPolicy for FifoPolicy {
    fn page_mapped(&mut self, page: PageId) {
        debug_assert!(!self.queue.contains(&page));
        self.queue.push_back(page);
    }

    fn choose_victim(&mut self) -> Option<PageId> {
        self.queue.pop_front()
    }
}
