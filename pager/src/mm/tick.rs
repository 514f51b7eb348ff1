//! Tick source
//!
//! A `SIGALRM` interval timer drives the replacement policy's aging hook at
//! a fixed cadence. The fault handler blocks `SIGALRM` for its whole run,
//! and user-context code that needs the engine lock wraps the critical
//! section in [`with_ticks_blocked`], so the tick handler can never contend
//! with anyone for the lock it takes.

use core::mem;
use core::ptr;

use crate::error::{last_errno, VmError, VmResult};
use crate::pager::{Pager, PAGER};
use crate::policy::ReplacementPolicy;

/// Aging cadence in milliseconds.
pub const TICK_INTERVAL_MS: u64 = 10;

/// Install the tick handler, returning the previous `SIGALRM` action.
pub(crate) fn install() -> VmResult<libc::sigaction> {
    // SAFETY: the zeroed sigaction is fully initialized before use and the
    // handler matches the SA_SIGINFO signature.
    unsafe {
        let mut action: libc::sigaction = mem::zeroed();
        libc::sigemptyset(&mut action.sa_mask);
        action.sa_flags = libc::SA_SIGINFO | libc::SA_RESTART;
        action.sa_sigaction = on_tick as usize;

        let mut prev: libc::sigaction = mem::zeroed();
        if libc::sigaction(libc::SIGALRM, &action, &mut prev) != 0 {
            return Err(VmError::SignalSetupFailed {
                signal: "SIGALRM",
                errno: last_errno(),
            });
        }
        Ok(prev)
    }
}

/// Reinstate the `SIGALRM` action that was active before [`install`].
pub(crate) fn restore(prev: libc::sigaction) -> VmResult<()> {
    // SAFETY: prev is a sigaction previously returned by the kernel.
    if unsafe { libc::sigaction(libc::SIGALRM, &prev, ptr::null_mut()) } != 0 {
        return Err(VmError::SignalSetupFailed {
            signal: "SIGALRM",
            errno: last_errno(),
        });
    }
    Ok(())
}

/// Arm the interval timer at [`TICK_INTERVAL_MS`].
pub(crate) fn start() -> VmResult<()> {
    set_timer(TICK_INTERVAL_MS)
}

/// Disarm the interval timer. No ticks are delivered afterwards.
pub(crate) fn stop() -> VmResult<()> {
    set_timer(0)
}

fn set_timer(interval_ms: u64) -> VmResult<()> {
    let tv = libc::timeval {
        tv_sec: (interval_ms / 1000) as libc::time_t,
        tv_usec: ((interval_ms % 1000) * 1000) as libc::suseconds_t,
    };
    let timer = libc::itimerval {
        it_interval: tv,
        it_value: tv,
    };
    // SAFETY: setitimer with a fully initialized itimerval.
    if unsafe { libc::setitimer(libc::ITIMER_REAL, &timer, ptr::null_mut()) } != 0 {
        return Err(VmError::TimerSetupFailed { errno: last_errno() });
    }
    Ok(())
}

/// Run `f` with `SIGALRM` blocked in the calling context.
///
/// Required around any user-context acquisition of the engine lock; see the
/// module docs.
pub(crate) fn with_ticks_blocked<R>(f: impl FnOnce() -> R) -> R {
    // SAFETY: the sigset calls operate on locals initialized by
    // sigemptyset, and the mask is restored before returning.
    unsafe {
        let mut block: libc::sigset_t = mem::zeroed();
        let mut saved: libc::sigset_t = mem::zeroed();
        libc::sigemptyset(&mut block);
        libc::sigaddset(&mut block, libc::SIGALRM);
        libc::sigprocmask(libc::SIG_BLOCK, &block, &mut saved);
        let result = f();
        libc::sigprocmask(libc::SIG_SETMASK, &saved, ptr::null_mut());
        result
    }
}

extern "C" fn on_tick(
    _signal: libc::c_int,
    _info: *mut libc::siginfo_t,
    _context: *mut libc::c_void,
) {
    let mut guard = PAGER.lock();
    // Ticks between stop() and the action restore find the slot empty.
    if let Some(pager) = guard.as_mut() {
        let Pager { core, policy, .. } = pager;
        policy.timer_tick(core);
    }
}
