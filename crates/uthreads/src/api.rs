//! Public thread operations.
//!
//! Every operation runs as one critical section: the preemption signal is
//! masked on entry and restored when the calling thread next leaves the
//! operation, which for [`block`] and [`sleep`] is only after it has been
//! switched out and back in. Usage errors are logged with the library prefix
//! and returned; the process keeps running.

use crate::config::Config;
use crate::error::{report, UthreadError, UthreadResult};
use crate::kernel;
use crate::scheduler::{BlockOutcome, Outgoing, Scheduler, Snapshot, Termination};
use crate::thread::{ThreadId, ThreadState};
use crate::timer;

/// Initializes the library with quanta of `quantum_usecs` microseconds of
/// virtual time and default sizing.
///
/// The caller becomes thread 0, Running, with one quantum on the books.
pub fn init(quantum_usecs: u32) -> UthreadResult<()> {
    init_with_config(Config::new(quantum_usecs))
}

/// Initializes the library from an explicit [`Config`].
pub fn init_with_config(config: Config) -> UthreadResult<()> {
    config.validate().map_err(report)?;

    critical_section::with(|cs| {
        if kernel::is_initialized(cs) {
            return Err(report(UthreadError::AlreadyInitialized));
        }
        let scheduler = Scheduler::new(&config);
        let quantum = scheduler.quantum();
        kernel::install(cs, scheduler);
        timer::configure(quantum, kernel::on_quantum_expired);

        log::info!(
            "uthreads initialized: quantum={}us stack_size={} max_threads={}",
            config.quantum_usecs,
            config.stack_size,
            config.max_threads
        );
        Ok(())
    })
}

/// Creates a thread that will run `entry` and queues it as Ready.
///
/// Returns the smallest free id. Returning from `entry` terminates the
/// thread.
pub fn spawn<F>(entry: F) -> UthreadResult<ThreadId>
where
    F: FnOnce() + Send + 'static,
{
    critical_section::with(|cs| {
        let id = kernel::with_initialized(cs, |scheduler| scheduler.spawn(Box::new(entry)))
            .map_err(report)?;
        log::debug!("spawned thread {id}");
        Ok(id)
    })
}

/// Terminates thread `tid`.
///
/// Terminating the main thread ends the process with status 0. Terminating
/// the calling thread does not return.
pub fn terminate(tid: ThreadId) -> UthreadResult<()> {
    critical_section::with(|cs| {
        let running = kernel::with_initialized(cs, |scheduler| {
            scheduler.thread(tid)?;
            Ok(scheduler.running())
        })
        .map_err(report)?;

        if tid.is_main() {
            log::info!("main thread terminated, exiting");
            std::process::exit(0);
        }
        if tid == running {
            log::debug!("thread {tid} terminated itself");
            kernel::exit_current(cs);
        }

        let termination =
            kernel::with_initialized(cs, |scheduler| scheduler.terminate(tid)).map_err(report)?;
        debug_assert_eq!(termination, Termination::Removed);
        log::debug!("terminated thread {tid}");
        Ok(())
    })
}

/// Blocks thread `tid` until it is resumed.
///
/// Blocking the calling thread switches away and returns only after another
/// thread resumes it. Blocking an already Blocked thread is not an error.
pub fn block(tid: ThreadId) -> UthreadResult<()> {
    critical_section::with(|cs| {
        let outcome =
            kernel::with_initialized(cs, |scheduler| scheduler.block(tid)).map_err(report)?;
        log::debug!("blocked thread {tid}");
        if outcome == BlockOutcome::SwitchRequired {
            kernel::switch(cs, Outgoing::Suspend(ThreadState::Blocked));
        }
        Ok(())
    })
}

/// Lifts an explicit block on thread `tid`.
///
/// A thread that is still sleeping stays Blocked until its countdown ends.
/// Resuming a Ready or Running thread has no effect.
pub fn resume(tid: ThreadId) -> UthreadResult<()> {
    critical_section::with(|cs| {
        kernel::with_initialized(cs, |scheduler| scheduler.resume(tid)).map_err(report)?;
        log::debug!("resumed thread {tid}");
        Ok(())
    })
}

/// Puts the calling thread to sleep for `quantums` timer expirations.
///
/// The main thread cannot sleep.
pub fn sleep(quantums: u32) -> UthreadResult<()> {
    critical_section::with(|cs| {
        let id = kernel::with_initialized(cs, |scheduler| {
            scheduler.sleep_running(quantums)?;
            Ok(scheduler.running())
        })
        .map_err(report)?;
        log::debug!("thread {id} sleeping for {quantums} quanta");
        kernel::switch(cs, Outgoing::Suspend(ThreadState::Blocked));
        Ok(())
    })
}

/// Id of the calling thread. The main thread before initialization.
pub fn current_tid() -> ThreadId {
    critical_section::with(|cs| {
        kernel::with_initialized(cs, |scheduler| Ok(scheduler.running())).unwrap_or(ThreadId::MAIN)
    })
}

/// Number of scheduling decisions since initialization, counting the initial
/// dispatch of the main thread. 0 before initialization.
pub fn total_quantums() -> u64 {
    critical_section::with(|cs| {
        kernel::with_initialized(cs, |scheduler| Ok(scheduler.total_quantums())).unwrap_or(0)
    })
}

/// Number of quanta thread `tid` has been dispatched for, including the
/// current one if it is running.
pub fn quantums(tid: ThreadId) -> UthreadResult<u64> {
    critical_section::with(|cs| {
        kernel::with_initialized(cs, |scheduler| Ok(scheduler.thread(tid)?.quantums()))
            .map_err(report)
    })
}

/// Scheduling state of thread `tid`.
pub fn thread_state(tid: ThreadId) -> UthreadResult<ThreadState> {
    critical_section::with(|cs| {
        kernel::with_initialized(cs, |scheduler| Ok(scheduler.thread(tid)?.state()))
            .map_err(report)
    })
}

/// Copy of the ready queue and blocked registry, taken atomically.
pub fn snapshot() -> UthreadResult<Snapshot> {
    critical_section::with(|cs| {
        kernel::with_initialized(cs, |scheduler| Ok(scheduler.snapshot())).map_err(report)
    })
}
