//! Fault router
//!
//! Every `SIGSEGV` the process takes lands here. In-range faults are the
//! engine's bread and butter: a fault on an unmapped page triggers a load
//! (evicting first if the budget is full), and a fault on an
//! under-permissioned page walks it one step up the NONE -> READ -> RDWR
//! ladder, recording the accessed or dirty bit as it goes. That ladder is
//! the whole trick by which the engine learns, without hardware help, which
//! pages were touched and which were modified: pages start with no access
//! so the first read shows up as a fault, and are then held at read-only so
//! the first write shows up as another.
//!
//! Out-of-range faults are genuine host bugs; they are reported with
//! async-signal-safe output and the process aborts. Nothing in this module
//! may allocate, unwind, or take a lock the interrupted code could hold.

use core::mem;
use core::sync::atomic::Ordering;

use crate::diag;
use crate::error::{last_errno, VmError, VmResult};
use crate::mm::protect::{self, Protection};
use crate::mm::{page_containing, PageId};
use crate::pager::{Pager, PagerCore, NUM_FAULTS, NUM_LOADS, PAGER, RESIDENT_PAGES};
use crate::policy::ReplacementPolicy;

// The `libc` crate does not expose these on this target; the values are
// fixed by the kernel's `asm-generic/siginfo.h` and stable across Linux
// architectures.
const SEGV_MAPERR: libc::c_int = 1;
const SEGV_ACCERR: libc::c_int = 2;

/// Classification of an in-range fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FaultKind {
    /// No mapping at the address: the page is not resident.
    Unmapped,
    /// Mapping present but the access exceeded its permission.
    Forbidden,
}

// ---------------------------------------------------------------------------
// Signal plumbing
// ---------------------------------------------------------------------------

/// Install the fault handler, returning the previous `SIGSEGV` action.
///
/// `SIGALRM` goes into the handler's blocked mask so no aging tick can run
/// in the middle of a fault.
pub(crate) fn install() -> VmResult<libc::sigaction> {
    // SAFETY: the zeroed sigaction is fully initialized before use, the
    // sigset calls operate on its embedded mask, and the handler matches
    // the SA_SIGINFO signature.
    unsafe {
        let mut action: libc::sigaction = mem::zeroed();
        libc::sigemptyset(&mut action.sa_mask);
        libc::sigaddset(&mut action.sa_mask, libc::SIGALRM);
        action.sa_flags = libc::SA_SIGINFO | libc::SA_RESTART;
        action.sa_sigaction = on_fault as usize;

        let mut prev: libc::sigaction = mem::zeroed();
        if libc::sigaction(libc::SIGSEGV, &action, &mut prev) != 0 {
            return Err(VmError::SignalSetupFailed {
                signal: "SIGSEGV",
                errno: last_errno(),
            });
        }
        Ok(prev)
    }
}

/// Reinstate the `SIGSEGV` action that was active before [`install`].
pub(crate) fn restore(prev: libc::sigaction) -> VmResult<()> {
    // SAFETY: prev is a sigaction previously returned by the kernel.
    if unsafe { libc::sigaction(libc::SIGSEGV, &prev, core::ptr::null_mut()) } != 0 {
        return Err(VmError::SignalSetupFailed {
            signal: "SIGSEGV",
            errno: last_errno(),
        });
    }
    Ok(())
}

extern "C" fn on_fault(
    _signal: libc::c_int,
    info: *mut libc::siginfo_t,
    _context: *mut libc::c_void,
) {
    // SAFETY: with SA_SIGINFO the kernel passes a valid siginfo_t, and
    // si_addr is defined for SIGSEGV.
    let (addr, code) = unsafe { ((*info).si_addr() as usize, (*info).si_code) };

    let start = crate::pager::vmem_start();
    let end = crate::pager::vmem_end();
    if addr < start || addr >= end {
        diag::fatal_hex("segmentation fault outside managed range at", addr);
    }

    let kind = match code {
        SEGV_MAPERR => FaultKind::Unmapped,
        SEGV_ACCERR => FaultKind::Forbidden,
        _ => diag::fatal_hex("unrecognized fault classification at", addr),
    };

    NUM_FAULTS.fetch_add(1, Ordering::Relaxed);

    let mut guard = PAGER.lock();
    let pager = match guard.as_mut() {
        Some(p) => p,
        None => diag::fatal_hex("fault with no active pager at", addr),
    };
    let page = match page_containing(pager.core.base, addr) {
        Some(p) => p,
        None => diag::fatal_hex("fault address escaped the range check:", addr),
    };
    route(pager, page, kind);
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

fn route(pager: &mut Pager, page: PageId, kind: FaultKind) {
    match kind {
        FaultKind::Unmapped => {
            if pager.core.resident == pager.core.max_resident {
                let victim = match pager.policy.choose_victim() {
                    Some(v) => v,
                    None => diag::fatal("resident set full but policy has no victim"),
                };
                unmap_page(&mut pager.core, victim);
            }
            // Mapped with no access so the pending touch immediately
            // faults again and reveals itself as a read or a write.
            map_page(&mut pager.core, page, Protection::empty());
            pager.policy.page_mapped(page);
        }
        FaultKind::Forbidden => {
            let perm = pager.core.table.entry(page).permission();
            if perm == Protection::empty() {
                ok_or_die(pager.core.set_protection(page, Protection::READ), page);
                pager.core.table.set_accessed(page, true);
            } else if perm == Protection::READ {
                ok_or_die(pager.core.set_protection(page, Protection::RDWR), page);
                pager.core.table.set_dirty(page, true);
            } else {
                // A fault on a fully-permitted page cannot happen.
                diag::fatal_hex("access fault on read-write page", page.index());
            }
        }
    }
}

/// Check out `page` from the backing store into a fresh mapping.
fn map_page(core: &mut PagerCore, page: PageId, perm: Protection) {
    if core.table.entry(page).is_resident() {
        diag::fatal_hex("mapping an already resident page", page.index());
    }
    if core.resident >= core.max_resident {
        diag::fatal("resident budget exhausted without eviction");
    }

    let addr = core.page_addr(page);
    // SAFETY: the page is in-range, page-aligned, and not resident, so no
    // live mapping exists at addr.
    if unsafe { protect::allocate_mapping(addr) }.is_err() {
        diag::fatal_hex("page mapping failed at", addr);
    }
    // SAFETY: the mapping just created is PAGE_SIZE writable bytes.
    if unsafe { core.store.slot_read(page, addr as *mut u8) }.is_err() {
        diag::fatal_hex("backing-store read failed for page", page.index());
    }

    core.table.clear(page);
    core.table.set_resident(page, true);
    ok_or_die(core.set_protection(page, perm), page);

    core.resident += 1;
    RESIDENT_PAGES.store(core.resident, Ordering::Relaxed);
    NUM_LOADS.fetch_add(1, Ordering::Relaxed);
}

/// Check `page` back into the backing store and drop its mapping.
fn unmap_page(core: &mut PagerCore, page: PageId) {
    let entry = core.table.entry(page);
    if !entry.is_resident() || core.resident == 0 {
        diag::fatal_hex("evicting a non-resident page", page.index());
    }

    let addr = core.page_addr(page);
    if entry.is_dirty() {
        // The outbound copy needs the kernel's permission to read the
        // page; aging may have revoked it since the dirtying write.
        ok_or_die(core.set_protection(page, Protection::READ), page);
        // SAFETY: the page is resident and now readable.
        if unsafe { core.store.slot_write(page, addr as *const u8) }.is_err() {
            diag::fatal_hex("write-back failed for page", page.index());
        }
    }

    // SAFETY: a resident page owns a live single-page mapping at addr.
    if unsafe { protect::release_mapping(addr) }.is_err() {
        diag::fatal_hex("page unmapping failed at", addr);
    }
    core.table.clear(page);
    core.resident -= 1;
    RESIDENT_PAGES.store(core.resident, Ordering::Relaxed);
}

fn ok_or_die(result: VmResult<()>, page: PageId) {
    if result.is_err() {
        diag::fatal_hex("protection change failed for page", page.index());
    }
}
