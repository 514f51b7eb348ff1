//! Backing store
//!
//! A private file holding every page's bytes while the page is not resident.
//! Slot `p` occupies bytes `[p * PAGE_SIZE, (p + 1) * PAGE_SIZE)`. The file
//! is created under a process-specific path and unlinked immediately after
//! opening, so it is reachable only through the retained descriptor and the
//! kernel reclaims it when the process exits. `ftruncate` establishes the
//! full size up front, which also makes the initial contents of every slot
//! all-zero.
//!
//! Slot transfers use `pread`/`pwrite` on the raw descriptor; both are
//! async-signal-safe, which matters because every transfer happens inside
//! the fault handler.

use std::ffi::CString;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use crate::error::{last_errno, VmError, VmResult};
use crate::mm::{PageId, NUM_PAGES, PAGE_SIZE};

pub struct BackingStore {
    fd: OwnedFd,
}

impl BackingStore {
    /// Create, size, and unlink the per-process store file.
    pub fn create() -> VmResult<Self> {
        let path = store_path();
        let cpath = CString::new(path.clone()).expect("store path has no NUL bytes");

        // SAFETY: cpath is a valid NUL-terminated string; O_EXCL guarantees
        // we never open a stale file from a recycled pid.
        let raw = unsafe {
            libc::open(
                cpath.as_ptr(),
                libc::O_RDWR | libc::O_CREAT | libc::O_EXCL,
                0o600 as libc::c_uint,
            )
        };
        if raw < 0 {
            return Err(VmError::StoreCreateFailed { errno: last_errno() });
        }
        // SAFETY: raw is a freshly opened descriptor owned by no one else.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        // Unlink right away; the descriptor keeps the inode alive.
        // SAFETY: cpath is the valid path just created.
        if unsafe { libc::unlink(cpath.as_ptr()) } != 0 {
            return Err(VmError::StoreCreateFailed { errno: last_errno() });
        }

        let len = (NUM_PAGES * PAGE_SIZE) as libc::off_t;
        // SAFETY: fd is a valid regular-file descriptor.
        if unsafe { libc::ftruncate(fd.as_raw_fd(), len) } != 0 {
            return Err(VmError::StoreSizeFailed { errno: last_errno() });
        }

        log::debug!("backing store created at {} ({} bytes)", path, len);
        Ok(Self { fd })
    }

    /// Copy slot `page` into the `PAGE_SIZE` bytes at `dst`.
    ///
    /// # Safety
    ///
    /// `dst` must be valid for `PAGE_SIZE` writes.
    pub unsafe fn slot_read(&self, page: PageId, dst: *mut u8) -> VmResult<()> {
        let offset = (page.index() * PAGE_SIZE) as libc::off_t;
        // SAFETY: dst is valid for PAGE_SIZE writes per this function's
        // contract; the offset is inside the file sized at create().
        let n = unsafe {
            libc::pread(self.fd.as_raw_fd(), dst.cast(), PAGE_SIZE, offset)
        };
        Self::check_transfer(page, n)
    }

    /// Copy the `PAGE_SIZE` bytes at `src` into slot `page`.
    ///
    /// # Safety
    ///
    /// `src` must be valid for `PAGE_SIZE` reads; in particular, if `src`
    /// points into the managed range the page's current protection must
    /// permit reading.
    pub unsafe fn slot_write(&self, page: PageId, src: *const u8) -> VmResult<()> {
        let offset = (page.index() * PAGE_SIZE) as libc::off_t;
        // SAFETY: src is valid for PAGE_SIZE reads per this function's
        // contract; the offset is inside the file sized at create().
        let n = unsafe {
            libc::pwrite(self.fd.as_raw_fd(), src.cast(), PAGE_SIZE, offset)
        };
        Self::check_transfer(page, n)
    }

    fn check_transfer(page: PageId, n: libc::ssize_t) -> VmResult<()> {
        if n < 0 {
            return Err(VmError::TransferFailed {
                page: page.index(),
                errno: last_errno(),
            });
        }
        if n as usize != PAGE_SIZE {
            // Regular-file I/O of one page either completes or fails; a
            // short count means the store is not the file we created.
            return Err(VmError::ShortTransfer {
                page: page.index(),
                expected: PAGE_SIZE,
                got: n as usize,
            });
        }
        Ok(())
    }
}

fn store_path() -> String {
    // SAFETY: getpid never fails.
    let pid = unsafe { libc::getpid() };
    let dir = std::env::var("TMPDIR").unwrap_or_else(|_| "/tmp".into());
    format!("{}/softvm_{}", dir.trim_end_matches('/'), pid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(idx: usize) -> PageId {
        PageId::new(idx).unwrap()
    }

    #[test]
    fn test_fresh_slots_are_zero() {
        let store = BackingStore::create().unwrap();
        let mut buf = vec![0xaau8; PAGE_SIZE];
        // SAFETY: buf is a PAGE_SIZE heap buffer.
        unsafe { store.slot_read(page(7), buf.as_mut_ptr()).unwrap() };
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_slot_round_trip() {
        let store = BackingStore::create().unwrap();
        let src: Vec<u8> = (0..PAGE_SIZE).map(|i| (i % 251) as u8).collect();
        let mut dst = vec![0u8; PAGE_SIZE];

        // SAFETY: both buffers are PAGE_SIZE heap buffers.
        unsafe {
            store.slot_write(page(3), src.as_ptr()).unwrap();
            store.slot_read(page(3), dst.as_mut_ptr()).unwrap();
        }
        assert_eq!(src, dst);
    }

    #[test]
    fn test_slots_are_disjoint() {
        let store = BackingStore::create().unwrap();
        let ones = vec![1u8; PAGE_SIZE];
        let twos = vec![2u8; PAGE_SIZE];
        let mut buf = vec![0u8; PAGE_SIZE];

        // SAFETY: all buffers are PAGE_SIZE heap buffers.
        unsafe {
            store.slot_write(page(0), ones.as_ptr()).unwrap();
            store.slot_write(page(1), twos.as_ptr()).unwrap();
            store.slot_read(page(0), buf.as_mut_ptr()).unwrap();
        }
        assert!(buf.iter().all(|&b| b == 1));
    }
}
