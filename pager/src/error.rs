//! Error types for the paging engine
//!
//! Only the init and teardown paths are fallible. Anything that goes wrong
//! while a fault or tick is being serviced is handled inside the signal
//! handlers and terminates the process (see [`crate::diag`]); signal handlers
//! cannot unwind, so there is nothing for a `Result` to carry there.

use core::fmt;

/// Errors surfaced by the user-context half of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "pager errors must be handled, not silently discarded"]
pub enum VmError {
    /// `max_resident` was zero or larger than the page count.
    InvalidResidentBudget { requested: usize, limit: usize },
    /// The crate was compiled for a different page size than the host uses.
    PageSizeMismatch { compiled: usize, host: usize },
    /// `init` has already been called in this process.
    AlreadyInitialized,
    /// `cleanup` or an accessor was called before `init`.
    NotInitialized,
    /// Could not find a free virtual range of the required length.
    RangeProbeFailed { len: usize, errno: i32 },
    /// Creating or unlinking the backing-store file failed.
    StoreCreateFailed { errno: i32 },
    /// Sizing the backing-store file failed.
    StoreSizeFailed { errno: i32 },
    /// A backing-store transfer moved fewer bytes than a full page.
    ShortTransfer {
        page: usize,
        expected: usize,
        got: usize,
    },
    /// A backing-store transfer failed outright.
    TransferFailed { page: usize, errno: i32 },
    /// `mmap` refused the fixed-address request.
    MapFailed { addr: usize, errno: i32 },
    /// `munmap` failed.
    UnmapFailed { addr: usize, errno: i32 },
    /// `mprotect` failed.
    ProtectFailed { addr: usize, errno: i32 },
    /// Installing a signal action failed.
    SignalSetupFailed { signal: &'static str, errno: i32 },
    /// Arming or disarming the interval timer failed.
    TimerSetupFailed { errno: i32 },
}

/// Convenience alias used throughout the crate.
pub type VmResult<T> = Result<T, VmError>;

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidResidentBudget { requested, limit } => {
                write!(
                    f,
                    "invalid resident budget: requested {}, must be 1..={}",
                    requested, limit
                )
            }
            Self::PageSizeMismatch { compiled, host } => {
                write!(
                    f,
                    "page size mismatch: compiled for {} bytes, host uses {}",
                    compiled, host
                )
            }
            Self::AlreadyInitialized => write!(f, "pager already initialized in this process"),
            Self::NotInitialized => write!(f, "pager not initialized"),
            Self::RangeProbeFailed { len, errno } => {
                write!(
                    f,
                    "could not reserve a {} byte virtual range (errno {})",
                    len, errno
                )
            }
            Self::StoreCreateFailed { errno } => {
                write!(f, "backing store creation failed (errno {})", errno)
            }
            Self::StoreSizeFailed { errno } => {
                write!(f, "backing store sizing failed (errno {})", errno)
            }
            Self::ShortTransfer {
                page,
                expected,
                got,
            } => {
                write!(
                    f,
                    "short backing-store transfer for page {}: {} of {} bytes",
                    page, got, expected
                )
            }
            Self::TransferFailed { page, errno } => {
                write!(
                    f,
                    "backing-store transfer for page {} failed (errno {})",
                    page, errno
                )
            }
            Self::MapFailed { addr, errno } => {
                write!(f, "mmap at 0x{:x} failed (errno {})", addr, errno)
            }
            Self::UnmapFailed { addr, errno } => {
                write!(f, "munmap at 0x{:x} failed (errno {})", addr, errno)
            }
            Self::ProtectFailed { addr, errno } => {
                write!(f, "mprotect at 0x{:x} failed (errno {})", addr, errno)
            }
            Self::SignalSetupFailed { signal, errno } => {
                write!(f, "installing {} action failed (errno {})", signal, errno)
            }
            Self::TimerSetupFailed { errno } => {
                write!(f, "interval timer setup failed (errno {})", errno)
            }
        }
    }
}

impl std::error::Error for VmError {}

/// Capture `errno` after a failed libc call.
pub(crate) fn last_errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}
