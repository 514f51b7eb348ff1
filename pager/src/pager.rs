//! Pager façade and process-wide state
//!
//! Signal handlers cannot carry user data, so the engine lives in a single
//! process-wide slot behind a [`spin::Mutex`]. The lock is taken only by the
//! two handlers and by init/teardown (the latter with ticks blocked), which
//! is what makes a spin lock safe here: no path can be interrupted by
//! another path that wants the same lock. Counters and the range bounds are
//! plain atomics so the read-only accessors never touch the lock at all --
//! a tick arriving while user context held it would spin forever.
//!
//! # Usage
//!
//! ```ignore
//! let base = pager::init(8, PolicyKind::Clock)?;
//! // read and write [base, base + VMEM_BYTES) like ordinary memory
//! pager::cleanup()?;
//! ```

use core::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use spin::Mutex;

use crate::diag;
use crate::error::{VmError, VmResult};
use crate::mm::backing::BackingStore;
use crate::mm::page_table::PageTable;
use crate::mm::protect::{self, Protection};
use crate::mm::{fault, page_address, tick, PageId, NUM_PAGES, PAGE_SIZE, VMEM_BYTES};
use crate::policy::{AgingView, PolicyKind, ReplacementPolicy};

// ---------------------------------------------------------------------------
// Process-wide state
// ---------------------------------------------------------------------------

/// The engine singleton. `None` outside the init..cleanup window.
pub(crate) static PAGER: Mutex<Option<Pager>> = Mutex::new(None);

/// Latched on the first successful `init`; never reset, the pager is
/// one-shot per process.
static INITIALIZED: AtomicBool = AtomicBool::new(false);

pub(crate) static VMEM_START: AtomicUsize = AtomicUsize::new(0);
pub(crate) static VMEM_END: AtomicUsize = AtomicUsize::new(0);
pub(crate) static NUM_FAULTS: AtomicU64 = AtomicU64::new(0);
pub(crate) static NUM_LOADS: AtomicU64 = AtomicU64::new(0);
pub(crate) static RESIDENT_PAGES: AtomicUsize = AtomicUsize::new(0);

/// Everything the handlers need, bundled so the fault router and the policy
/// can borrow disjoint halves.
pub(crate) struct Pager {
    pub(crate) core: PagerCore,
    pub(crate) policy: Box<dyn ReplacementPolicy + Send>,
    pub(crate) prev_segv: libc::sigaction,
    pub(crate) prev_alrm: libc::sigaction,
}

/// The engine below the policy: page table, backing store, geometry, and
/// the resident budget.
pub(crate) struct PagerCore {
    pub(crate) table: PageTable,
    pub(crate) store: BackingStore,
    pub(crate) base: usize,
    pub(crate) max_resident: usize,
    pub(crate) resident: usize,
}

impl PagerCore {
    pub(crate) fn page_addr(&self, page: PageId) -> usize {
        page_address(self.base, page)
    }

    /// Apply `perm` to the page's kernel mapping and mirror it into the PTE.
    ///
    /// The only route through which the two can change, so they can never
    /// disagree: on error the caller aborts before the PTE is touched.
    pub(crate) fn set_protection(&mut self, page: PageId, perm: Protection) -> VmResult<()> {
        let addr = self.page_addr(page);
        // SAFETY: every caller passes a resident page, which owns a live
        // single-page mapping at addr.
        unsafe { protect::apply_protection(addr, perm)? };
        self.table.set_permission(page, perm);
        Ok(())
    }
}

impl Drop for PagerCore {
    fn drop(&mut self) {
        for idx in 0..NUM_PAGES {
            let page = match PageId::new(idx) {
                Some(p) => p,
                None => break,
            };
            if self.table.entry(page).is_resident() {
                let addr = self.page_addr(page);
                // SAFETY: resident pages own a live mapping at addr.
                if let Err(e) = unsafe { protect::release_mapping(addr) } {
                    log::warn!("leaked mapping for page {}: {}", idx, e);
                }
            }
        }
    }
}

impl AgingView for PagerCore {
    fn accessed(&self, page: PageId) -> bool {
        self.table.entry(page).is_accessed()
    }

    fn demote(&mut self, page: PageId) {
        debug_assert!(self.table.entry(page).is_resident());
        self.table.set_accessed(page, false);
        if self.set_protection(page, Protection::empty()).is_err() {
            // Tick-handler context: nothing to return an error to.
            diag::fatal_hex("protection revoke failed for page", page.index());
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Reserve the managed range and start demand paging over it with one of
/// the built-in replacement policies.
///
/// At most `max_resident` of the range's [`NUM_PAGES`] pages are kept
/// resident at a time. Returns the base address; the caller may then use
/// `[base, base + VMEM_BYTES)` like ordinary memory. One-shot per process;
/// must be paired with exactly one [`cleanup`].
pub fn init(max_resident: usize, kind: PolicyKind) -> VmResult<*mut u8> {
    if max_resident == 0 || max_resident > NUM_PAGES {
        return Err(VmError::InvalidResidentBudget {
            requested: max_resident,
            limit: NUM_PAGES,
        });
    }
    log::info!("replacement policy: {}", kind);
    init_with_policy(max_resident, kind.build(max_resident))
}

/// Like [`init`], but with a caller-supplied replacement policy.
pub fn init_with_policy(
    max_resident: usize,
    policy: Box<dyn ReplacementPolicy + Send>,
) -> VmResult<*mut u8> {
    if max_resident == 0 || max_resident > NUM_PAGES {
        return Err(VmError::InvalidResidentBudget {
            requested: max_resident,
            limit: NUM_PAGES,
        });
    }
    let host = protect::host_page_size();
    if host != PAGE_SIZE {
        return Err(VmError::PageSizeMismatch {
            compiled: PAGE_SIZE,
            host,
        });
    }
    if INITIALIZED.load(Ordering::Relaxed) {
        return Err(VmError::AlreadyInitialized);
    }

    // Probe after every other allocation so nothing the setup path does
    // can wander into the just-unmapped range.
    let store = BackingStore::create()?;
    let base = protect::probe_free_range(VMEM_BYTES)?;

    let prev_segv = fault::install()?;
    let prev_alrm = match tick::install() {
        Ok(prev) => prev,
        Err(e) => {
            let _ = fault::restore(prev_segv);
            return Err(e);
        }
    };

    *PAGER.lock() = Some(Pager {
        core: PagerCore {
            table: PageTable::new(),
            store,
            base,
            max_resident,
            resident: 0,
        },
        policy,
        prev_segv,
        prev_alrm,
    });
    VMEM_START.store(base, Ordering::Relaxed);
    VMEM_END.store(base + VMEM_BYTES, Ordering::Relaxed);

    if let Err(e) = tick::start() {
        let _ = fault::restore(prev_segv);
        let _ = tick::restore(prev_alrm);
        *PAGER.lock() = None;
        VMEM_START.store(0, Ordering::Relaxed);
        VMEM_END.store(0, Ordering::Relaxed);
        return Err(e);
    }

    INITIALIZED.store(true, Ordering::Relaxed);
    log::info!(
        "managed range [0x{:x}, 0x{:x}), {} pages, {} resident max",
        base,
        base + VMEM_BYTES,
        NUM_PAGES,
        max_resident
    );
    Ok(base as *mut u8)
}

/// Tear the engine down: disarm the tick source, restore the previous
/// signal actions, and release the policy, resident mappings, and store
/// descriptor.
///
/// The managed range must not be touched afterwards.
pub fn cleanup() -> VmResult<()> {
    // Every user-context acquisition of the lock runs with ticks blocked;
    // a tick arriving mid-acquisition would spin on the lock forever.
    if !tick::with_ticks_blocked(|| PAGER.lock().is_some()) {
        return Err(VmError::NotInitialized);
    }
    tick::stop()?;
    let taken = tick::with_ticks_blocked(|| PAGER.lock().take());
    let pager = taken.ok_or(VmError::NotInitialized)?;

    fault::restore(pager.prev_segv)?;
    tick::restore(pager.prev_alrm)?;

    log::info!(
        "pager shut down: {} faults, {} loads",
        num_faults(),
        num_loads()
    );
    Ok(())
}

/// First address of the managed range (0 before `init`).
pub fn vmem_start() -> usize {
    VMEM_START.load(Ordering::Relaxed)
}

/// One past the last address of the managed range.
pub fn vmem_end() -> usize {
    VMEM_END.load(Ordering::Relaxed)
}

/// In-range faults serviced so far. Monotone; counts permission
/// up-leveling faults as well as page loads, so `num_faults >= num_loads`.
pub fn num_faults() -> u64 {
    NUM_FAULTS.load(Ordering::Relaxed)
}

/// Pages loaded from the backing store so far. Monotone.
pub fn num_loads() -> u64 {
    NUM_LOADS.load(Ordering::Relaxed)
}

/// Pages currently resident. Never exceeds the configured budget.
pub fn resident_count() -> usize {
    RESIDENT_PAGES.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Anything that actually faults runs in the per-scenario binaries under
    // tests/; here we only exercise the validation that fails before any
    // process-wide state is touched.

    #[test]
    fn test_rejects_zero_budget() {
        assert_eq!(
            init(0, PolicyKind::Fifo).unwrap_err(),
            VmError::InvalidResidentBudget {
                requested: 0,
                limit: NUM_PAGES,
            }
        );
    }

    #[test]
    fn test_rejects_oversized_budget() {
        assert_eq!(
            init(NUM_PAGES + 1, PolicyKind::Fifo).unwrap_err(),
            VmError::InvalidResidentBudget {
                requested: NUM_PAGES + 1,
                limit: NUM_PAGES,
            }
        );
    }
}
