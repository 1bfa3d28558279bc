//! Quantum Timer
//!
//! Preemption is driven by the process virtual-time interval timer: it counts
//! only CPU time spent in user mode and raises `SIGVTALRM` when it expires.
//! Every arming is one-shot. The switch engine re-arms it for a full quantum
//! each time it dispatches a thread, so the timer behaves periodically only
//! as long as switches keep happening.
//!
//! Failing to install the handler or to arm the timer leaves the scheduler
//! without a clock, so both are fatal.

use core::mem::MaybeUninit;
use std::io;
use std::time::Duration;

use crate::critical::PREEMPTION_SIGNAL;
use crate::error::{fatal, SystemError};

const USECS_PER_SEC: u32 = 1_000_000;

/// Length of one scheduling quantum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantum {
    usecs: u32,
}

impl Quantum {
    /// Creates a quantum of `usecs` microseconds of virtual time.
    pub fn from_usecs(usecs: u32) -> Self {
        Quantum { usecs }
    }

    /// Quantum length in microseconds.
    pub fn usecs(&self) -> u32 {
        self.usecs
    }

    /// Quantum length as a Duration.
    pub fn period(&self) -> Duration {
        Duration::from_micros(u64::from(self.usecs))
    }

    /// One-shot timer value for this quantum. `tv_usec` must stay below one
    /// second, so longer quanta are split.
    pub fn to_itimerval(&self) -> libc::itimerval {
        libc::itimerval {
            it_interval: libc::timeval {
                tv_sec: 0,
                tv_usec: 0,
            },
            it_value: libc::timeval {
                tv_sec: (self.usecs / USECS_PER_SEC) as libc::time_t,
                tv_usec: (self.usecs % USECS_PER_SEC) as libc::suseconds_t,
            },
        }
    }
}

/// Installs `handler` for the preemption signal and arms the first quantum.
pub(crate) fn configure(quantum: Quantum, handler: extern "C" fn(libc::c_int)) {
    install_handler(handler);
    arm(quantum);
}

/// Routes `SIGVTALRM` to `handler`. The signal stays masked while the handler
/// runs.
fn install_handler(handler: extern "C" fn(libc::c_int)) {
    let mut action: libc::sigaction = unsafe { MaybeUninit::zeroed().assume_init() };
    action.sa_sigaction = handler as usize as libc::sighandler_t;
    action.sa_flags = 0;
    unsafe {
        libc::sigemptyset(&mut action.sa_mask);
        libc::sigaddset(&mut action.sa_mask, PREEMPTION_SIGNAL);
    }

    let rc = unsafe { libc::sigaction(PREEMPTION_SIGNAL, &action, core::ptr::null_mut()) };
    if rc != 0 {
        fatal(SystemError::SignalHandler(io::Error::last_os_error()));
    }
}

/// Arms a one-shot expiry one quantum of virtual time from now.
pub(crate) fn arm(quantum: Quantum) {
    let value = quantum.to_itimerval();
    let rc = unsafe { libc::setitimer(libc::ITIMER_VIRTUAL, &value, core::ptr::null_mut()) };
    if rc != 0 {
        fatal(SystemError::Timer(io::Error::last_os_error()));
    }
}
