//! Kernel mapping and protection primitives
//!
//! Thin wrappers over `mmap`/`mprotect`/`munmap` for single-page regions of
//! the managed range, plus the init-time probe that picks the range's base
//! address. All functions here operate on raw addresses; coupling the kernel
//! state to the page-table entry is the caller's job so that the two can
//! never be updated separately by accident.

use crate::error::{last_errno, VmError, VmResult};
use crate::mm::PAGE_SIZE;

bitflags::bitflags! {
    /// Access permission of a managed page.
    ///
    /// Only three values occur: `empty()` (no access), `READ`, and `RDWR`.
    /// The fault router walks pages up this ladder one fault at a time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Protection: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const RDWR = Self::READ.bits() | Self::WRITE.bits();
    }
}

impl Protection {
    /// The corresponding `PROT_*` bits for `mmap`/`mprotect`.
    pub(crate) fn prot_bits(self) -> libc::c_int {
        let mut bits = libc::PROT_NONE;
        if self.contains(Protection::READ) {
            bits |= libc::PROT_READ;
        }
        if self.contains(Protection::WRITE) {
            bits |= libc::PROT_WRITE;
        }
        bits
    }
}

/// Address hint for the managed range: far below the region where the
/// kernel places ordinary mmaps (heap arenas, shared libraries, thread
/// stacks), so nothing wanders into the range after the probe unmaps it.
#[cfg(target_pointer_width = "64")]
const RANGE_HINT: usize = 0x6000_0000_0000;
#[cfg(target_pointer_width = "32")]
const RANGE_HINT: usize = 0x2000_0000;

/// Find a free virtual range of `len` bytes and return its base address.
///
/// The kernel validates the hinted range with an anonymous `PROT_NONE`
/// reservation (falling back to an address of its own choosing if the hint
/// is taken), which is then immediately unmapped: the managed range must
/// have *no* mapping at all, because an unmapped touch is what produces
/// the no-mapping fault classification that drives page loads. The process
/// is single-threaded at init, so nothing else claims the window between
/// the unmap and the first fixed-address mapping; page mappings use
/// `MAP_FIXED_NOREPLACE`, so even a surprise squatter aborts the process
/// instead of being silently clobbered.
pub(crate) fn probe_free_range(len: usize) -> VmResult<usize> {
    // SAFETY: anonymous reservation; without MAP_FIXED the hint cannot
    // replace an existing mapping.
    let addr = unsafe {
        libc::mmap(
            RANGE_HINT as *mut libc::c_void,
            len,
            libc::PROT_NONE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE,
            -1,
            0,
        )
    };
    if addr == libc::MAP_FAILED {
        return Err(VmError::RangeProbeFailed {
            len,
            errno: last_errno(),
        });
    }
    // SAFETY: unmapping exactly the reservation we just received.
    if unsafe { libc::munmap(addr, len) } != 0 {
        return Err(VmError::RangeProbeFailed {
            len,
            errno: last_errno(),
        });
    }
    Ok(addr as usize)
}

/// Materialize a private, anonymous, zero-filled read-write mapping at
/// exactly `addr`.
///
/// # Safety
///
/// `addr` must be a page-aligned address inside the managed range with no
/// live mapping, so that `MAP_FIXED` cannot clobber foreign memory.
pub(crate) unsafe fn allocate_mapping(addr: usize) -> VmResult<()> {
    // SAFETY: per this function's contract the fixed range is page-aligned
    // and free; MAP_FIXED_NOREPLACE fails rather than replace a mapping.
    let got = unsafe {
        libc::mmap(
            addr as *mut libc::c_void,
            PAGE_SIZE,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_FIXED_NOREPLACE,
            -1,
            0,
        )
    };
    if got == libc::MAP_FAILED || got as usize != addr {
        return Err(VmError::MapFailed {
            addr,
            errno: last_errno(),
        });
    }
    Ok(())
}

/// Remove the single-page mapping at `addr`.
///
/// # Safety
///
/// `addr` must be the page-aligned base of a mapping previously created by
/// [`allocate_mapping`].
pub(crate) unsafe fn release_mapping(addr: usize) -> VmResult<()> {
    // SAFETY: unmaps exactly one page this module mapped earlier.
    if unsafe { libc::munmap(addr as *mut libc::c_void, PAGE_SIZE) } != 0 {
        return Err(VmError::UnmapFailed {
            addr,
            errno: last_errno(),
        });
    }
    Ok(())
}

/// Apply `perm` to the single-page region at `addr`.
///
/// # Safety
///
/// `addr` must be the page-aligned base of a live mapping in the managed
/// range.
pub(crate) unsafe fn apply_protection(addr: usize, perm: Protection) -> VmResult<()> {
    // SAFETY: the caller guarantees a live single-page mapping at addr.
    if unsafe { libc::mprotect(addr as *mut libc::c_void, PAGE_SIZE, perm.prot_bits()) } != 0 {
        return Err(VmError::ProtectFailed {
            addr,
            errno: last_errno(),
        });
    }
    Ok(())
}

/// Host page size as reported by the kernel.
pub(crate) fn host_page_size() -> usize {
    // SAFETY: sysconf with a valid name has no preconditions.
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::VMEM_BYTES;

    #[test]
    fn test_prot_bits() {
        assert_eq!(Protection::empty().prot_bits(), libc::PROT_NONE);
        assert_eq!(Protection::READ.prot_bits(), libc::PROT_READ);
        assert_eq!(
            Protection::RDWR.prot_bits(),
            libc::PROT_READ | libc::PROT_WRITE
        );
    }

    #[test]
    fn test_ladder_is_two_bits() {
        // The PTE reserves exactly two bits for the permission field.
        assert!(Protection::all().bits() <= 0b11);
    }

    #[test]
    fn test_probe_returns_aligned_range() {
        let base = probe_free_range(VMEM_BYTES).unwrap();
        assert_ne!(base, 0);
        assert_eq!(base % PAGE_SIZE, 0);
    }
}
