//! SoftVM: a user-space demand-paging engine
//!
//! SoftVM reserves a fixed contiguous virtual range in the host process and
//! pretends only a bounded number of its pages fit in memory at once. Every
//! touch of a non-resident or under-permissioned page is trapped as a
//! memory-protection fault, serviced by loading the page from an unlinked
//! backing file (evicting a victim when the budget is full), and retried
//! transparently. The result looks like ordinary memory to the caller while
//! exercising a real paging state machine: residency, permission ladders,
//! soft accessed/dirty bits, and pluggable FIFO or CLOCK/LRU replacement.
//!
//! ```ignore
//! softvm_pager::logger::init();
//! let base = softvm_pager::init(8, softvm_pager::PolicyKind::Clock)?;
//! // SAFETY: base..base + VMEM_BYTES is the managed range.
//! unsafe { base.write_volatile(42) };
//! assert_eq!(unsafe { base.read_volatile() }, 42);
//! softvm_pager::cleanup()?;
//! ```
//!
//! Accesses to the range are best made through volatile reads and writes so
//! the compiler neither elides nor merges the touches that drive the
//! engine. One pager per process; the fault handler keeps all of its state
//! in a process-wide slot because signal handlers cannot carry user data.

mod diag;
pub mod error;
pub mod logger;
pub mod mm;
mod pager;
pub mod policy;

pub use error::{VmError, VmResult};
pub use mm::tick::TICK_INTERVAL_MS;
pub use mm::{PageId, NUM_PAGES, PAGE_SIZE, VMEM_BYTES};
pub use pager::{
    cleanup, init, init_with_policy, num_faults, num_loads, resident_count, vmem_end, vmem_start,
};
pub use policy::{AgingView, PolicyKind, ReplacementPolicy};
