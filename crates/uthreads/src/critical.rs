//! Critical Section Management
//!
//! The scheduler's only synchronization primitive is masking the preemption
//! signal. This module plugs that primitive into the `critical-section`
//! crate, so `critical_section::with` is the critical section for the
//! scheduler itself and for any application code that shares data between
//! green threads.
//!
//! Nesting is supported: the restore state records whether `SIGVTALRM` was
//! already masked on entry, and only the outermost section unmasks it. This is
//! what lets the same switch routine run from a façade call (unmasked on
//! entry) and from the timer handler (masked by the kernel on entry).
//!
//! The mask is per OS thread. All green threads share the OS thread that
//! initialized the library.

use core::mem::MaybeUninit;
use std::io;

use crate::error::{fatal, SystemError};

/// The signal that drives preemption.
pub const PREEMPTION_SIGNAL: libc::c_int = libc::SIGVTALRM;

struct PreemptionMask;

critical_section::set_impl!(PreemptionMask);

unsafe impl critical_section::Impl for PreemptionMask {
    unsafe fn acquire() -> critical_section::RawRestoreState {
        let previous = change_mask(libc::SIG_BLOCK, &preemption_set());
        contains_preemption(&previous)
    }

    unsafe fn release(was_masked: critical_section::RawRestoreState) {
        if !was_masked {
            change_mask(libc::SIG_UNBLOCK, &preemption_set());
        }
    }
}

/// Returns true if the preemption signal is masked on the calling OS thread.
pub fn is_preemption_masked() -> bool {
    let mut current = empty_set();
    let rc = unsafe { libc::pthread_sigmask(libc::SIG_BLOCK, core::ptr::null(), &mut current) };
    if rc != 0 {
        fatal(SystemError::SignalMask(io::Error::from_raw_os_error(rc)));
    }
    contains_preemption(&current)
}

/// Replaces the signal mask with the empty set. A fresh thread starts with
/// nothing masked, whatever the mask of the thread that switched to it.
pub(crate) fn clear_mask() {
    change_mask(libc::SIG_SETMASK, &empty_set());
}

fn empty_set() -> libc::sigset_t {
    let mut set = MaybeUninit::<libc::sigset_t>::uninit();
    unsafe {
        libc::sigemptyset(set.as_mut_ptr());
        set.assume_init()
    }
}

fn preemption_set() -> libc::sigset_t {
    let mut set = empty_set();
    unsafe {
        libc::sigaddset(&mut set, PREEMPTION_SIGNAL);
    }
    set
}

fn contains_preemption(set: &libc::sigset_t) -> bool {
    unsafe { libc::sigismember(set, PREEMPTION_SIGNAL) == 1 }
}

/// Applies `how` with `set` and returns the previous mask. Failure to change
/// the mask leaves the scheduler state unprotected, so it is fatal.
fn change_mask(how: libc::c_int, set: &libc::sigset_t) -> libc::sigset_t {
    let mut previous = empty_set();
    let rc = unsafe { libc::pthread_sigmask(how, set, &mut previous) };
    if rc != 0 {
        fatal(SystemError::SignalMask(io::Error::from_raw_os_error(rc)));
    }
    previous
}
