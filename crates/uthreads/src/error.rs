//! Error types and the diagnostic policy.
//!
//! Usage and resource errors are reported and handed back to the caller; the
//! process keeps running. OS failures in the primitives the scheduler depends
//! on (signal disposition, interval timer, signal mask) are unrecoverable and
//! end the process.

use std::io;

use thiserror::Error;

use crate::thread::ThreadId;

/// Prefix of every library usage diagnostic.
pub const LIBRARY_ERROR_PREFIX: &str = "thread library error: ";

/// Prefix of every OS failure diagnostic.
pub const SYSTEM_ERROR_PREFIX: &str = "system error: ";

/// Exit status used when an OS primitive fails.
pub const EXIT_SYSTEM_FAILURE: i32 = 1;

/// Usage and resource errors returned by the façade.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UthreadError {
    #[error("the library has not been initialized")]
    NotInitialized,
    #[error("the library is already initialized")]
    AlreadyInitialized,
    #[error("quantum length must be positive")]
    NonPositiveQuantum,
    #[error("sleep duration must be positive")]
    NonPositiveSleep,
    #[error("entry point cannot be null")]
    MissingEntryPoint,
    #[error("there is no thread with id {0}")]
    NoSuchThread(ThreadId),
    #[error("no space for a new thread ({0} threads alive)")]
    ThreadLimitReached(usize),
    #[error("cannot block the main thread")]
    BlockMainThread,
    #[error("the main thread cannot sleep")]
    SleepMainThread,
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

pub type UthreadResult<T> = Result<T, UthreadError>;

/// OS-level failures. Never returned: they end the process.
#[derive(Error, Debug)]
pub enum SystemError {
    #[error("failed to set signal handler: {0}")]
    SignalHandler(#[source] io::Error),
    #[error("failed to arm the quantum timer: {0}")]
    Timer(#[source] io::Error),
    #[error("failed to change the signal mask: {0}")]
    SignalMask(#[source] io::Error),
}

/// Emits the diagnostic for a usage error and hands it back for `?`/`Err`.
pub(crate) fn report(err: UthreadError) -> UthreadError {
    log::error!("{LIBRARY_ERROR_PREFIX}{err}");
    err
}

/// Reports an OS failure and terminates the process.
pub(crate) fn fatal(err: SystemError) -> ! {
    log::error!("{SYSTEM_ERROR_PREFIX}{err}");
    eprintln!("{SYSTEM_ERROR_PREFIX}{err}");
    std::process::exit(EXIT_SYSTEM_FAILURE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_messages() {
        assert_eq!(
            UthreadError::NoSuchThread(ThreadId(7)).to_string(),
            "there is no thread with id 7"
        );
        assert_eq!(
            UthreadError::ThreadLimitReached(100).to_string(),
            "no space for a new thread (100 threads alive)"
        );
        assert_eq!(
            UthreadError::InvalidConfig("stack size below minimum").to_string(),
            "invalid configuration: stack size below minimum"
        );
    }

    #[test]
    fn system_error_keeps_source() {
        use std::error::Error as _;

        let err = SystemError::Timer(io::Error::from_raw_os_error(libc::EINVAL));
        assert!(err.to_string().starts_with("failed to arm the quantum timer"));
        assert!(err.source().is_some());
    }

    #[test]
    fn report_is_transparent() {
        assert_eq!(
            report(UthreadError::BlockMainThread),
            UthreadError::BlockMainThread
        );
    }
}
