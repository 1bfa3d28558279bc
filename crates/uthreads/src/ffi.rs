//! C ABI.
//!
//! Thin wrappers over [`api`](crate::api) for programs linking the static
//! library. Every function returns `-1` on failure and a non-negative value
//! otherwise; the diagnostic has already been emitted by then.

use libc::c_int;

use crate::api;
use crate::error::{report, UthreadError, UthreadResult};
use crate::thread::ThreadId;

/// Thread body as seen from C.
pub type ThreadEntryPoint = Option<extern "C" fn()>;

const FAILURE: c_int = -1;

fn to_status(result: UthreadResult<()>) -> c_int {
    match result {
        Ok(()) => 0,
        Err(_) => FAILURE,
    }
}

fn to_int<T: TryInto<c_int>>(result: UthreadResult<T>) -> c_int {
    result
        .ok()
        .and_then(|value| value.try_into().ok())
        .unwrap_or(FAILURE)
}

/// Negative ids never name a thread.
fn tid_from(tid: c_int) -> UthreadResult<ThreadId> {
    usize::try_from(tid)
        .map(ThreadId)
        .map_err(|_| report(UthreadError::NoSuchThread(ThreadId(usize::MAX))))
}

/// Initializes the library with quanta of `quantum_usecs` microseconds.
#[no_mangle]
pub extern "C" fn uthread_init(quantum_usecs: c_int) -> c_int {
    let result = u32::try_from(quantum_usecs)
        .map_err(|_| report(UthreadError::NonPositiveQuantum))
        .and_then(api::init);
    to_status(result)
}

/// Creates a thread running `entry_point`. Returns its id.
#[no_mangle]
pub extern "C" fn uthread_spawn(entry_point: ThreadEntryPoint) -> c_int {
    let result = entry_point
        .ok_or_else(|| report(UthreadError::MissingEntryPoint))
        .and_then(|entry| api::spawn(move || entry()))
        .map(|tid| tid.0);
    to_int(result)
}

/// Terminates thread `tid`. Does not return when `tid` is the caller or 0.
#[no_mangle]
pub extern "C" fn uthread_terminate(tid: c_int) -> c_int {
    to_status(tid_from(tid).and_then(api::terminate))
}

/// Blocks thread `tid`.
#[no_mangle]
pub extern "C" fn uthread_block(tid: c_int) -> c_int {
    to_status(tid_from(tid).and_then(api::block))
}

/// Lifts an explicit block on thread `tid`.
#[no_mangle]
pub extern "C" fn uthread_resume(tid: c_int) -> c_int {
    to_status(tid_from(tid).and_then(api::resume))
}

/// Puts the caller to sleep for `num_quantums` timer expirations.
#[no_mangle]
pub extern "C" fn uthread_sleep(num_quantums: c_int) -> c_int {
    let result = u32::try_from(num_quantums)
        .map_err(|_| report(UthreadError::NonPositiveSleep))
        .and_then(api::sleep);
    to_status(result)
}

/// Id of the calling thread.
#[no_mangle]
pub extern "C" fn uthread_get_tid() -> c_int {
    to_int(Ok(api::current_tid().0))
}

/// Total number of quanta since initialization.
#[no_mangle]
pub extern "C" fn uthread_get_total_quantums() -> c_int {
    to_int(Ok(api::total_quantums()))
}

/// Number of quanta thread `tid` has run for.
#[no_mangle]
pub extern "C" fn uthread_get_quantums(tid: c_int) -> c_int {
    to_int(tid_from(tid).and_then(api::quantums))
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn noop() {}

    #[test]
    fn negative_arguments_fail() {
        assert_eq!(uthread_init(-5), FAILURE);
        assert_eq!(uthread_sleep(-1), FAILURE);
        assert_eq!(uthread_block(-1), FAILURE);
        assert_eq!(uthread_get_quantums(-3), FAILURE);
    }

    #[test]
    fn null_entry_point_fails() {
        assert_eq!(uthread_spawn(None), FAILURE);
    }

    #[test]
    fn uninitialized_calls_fail() {
        assert_eq!(uthread_init(0), FAILURE);
        assert_eq!(uthread_spawn(Some(noop)), FAILURE);
        assert_eq!(uthread_resume(1), FAILURE);
        assert_eq!(uthread_get_tid(), 0);
        assert_eq!(uthread_get_total_quantums(), 0);
    }

    #[test]
    fn conversions() {
        assert_eq!(to_status(Ok(())), 0);
        assert_eq!(to_status(Err(UthreadError::BlockMainThread)), FAILURE);
        assert_eq!(to_int(Ok(7usize)), 7);
        assert_eq!(to_int(Ok(u64::MAX)), FAILURE);
        assert_eq!(tid_from(4), Ok(ThreadId(4)));
        assert!(tid_from(-1).is_err());
    }
}
