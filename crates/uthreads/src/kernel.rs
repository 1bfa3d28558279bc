//! Switch engine.
//!
//! Holds the process-wide [`Scheduler`] and moves control between threads.
//! There are exactly three ways to leave the running thread:
//!
//! - the quantum timer expires (`on_quantum_expired`), and the thread goes
//!   back to the ready queue;
//! - the thread blocks or sleeps itself, and goes to the blocked registry;
//! - the thread terminates (`exit_current`), and its continuation is
//!   dropped.
//!
//! Every switch happens with the preemption signal masked. The scheduler is
//! borrowed only long enough to plan the switch; the jump itself happens after
//! the borrow ends, since the thread being resumed will borrow it again.
//!
//! Nothing on the signal path allocates or logs.

use core::cell::RefCell;

use critical_section::{CriticalSection, Mutex};

use crate::context::{self, Context};
use crate::critical;
use crate::error::{UthreadError, UthreadResult};
use crate::scheduler::{Outgoing, Scheduler};
use crate::thread::ThreadState;
use crate::timer;

/// The process-wide scheduler, present once the library is initialized.
static SCHEDULER: Mutex<RefCell<Option<Scheduler>>> = Mutex::new(RefCell::new(None));

/// Returns true once [`install`] has run.
pub(crate) fn is_initialized(cs: CriticalSection<'_>) -> bool {
    SCHEDULER.borrow_ref(cs).is_some()
}

/// Makes `scheduler` the process-wide scheduler.
pub(crate) fn install(cs: CriticalSection<'_>, scheduler: Scheduler) {
    *SCHEDULER.borrow_ref_mut(cs) = Some(scheduler);
}

/// Runs `f` on the initialized scheduler.
///
/// Frees any thread that terminated itself since the last call first; this
/// runs on the stack of a different thread, so freeing the stack is safe.
pub(crate) fn with_initialized<F, R>(cs: CriticalSection<'_>, f: F) -> UthreadResult<R>
where
    F: FnOnce(&mut Scheduler) -> UthreadResult<R>,
{
    let mut slot = SCHEDULER.borrow_ref_mut(cs);
    let scheduler = slot.as_mut().ok_or(UthreadError::NotInitialized)?;
    scheduler.reap();
    f(scheduler)
}

/// Takes the running thread off the CPU as described by `outgoing` and
/// resumes the head of the ready queue, re-arming the timer for a full
/// quantum.
///
/// Returns when the outgoing thread is resumed. Never returns for
/// [`Outgoing::Terminated`].
pub(crate) fn switch(cs: CriticalSection<'_>, outgoing: Outgoing) {
    let planned = {
        let mut slot = SCHEDULER.borrow_ref_mut(cs);
        slot.as_mut()
            .map(|scheduler| (scheduler.plan_switch(outgoing), scheduler.quantum()))
    };
    let Some((plan, quantum)) = planned else {
        return;
    };

    timer::arm(quantum);
    match plan.from {
        // The only Ready thread picked itself again.
        Some(from) if from as *const Context == plan.to => {}
        // SAFETY: both contexts live in boxed control blocks that stay put
        // until the thread is destroyed, and no scheduler borrow is held.
        Some(from) => unsafe { context::switch(from, plan.to) },
        // SAFETY: as above; the retired thread's stack is freed only by a
        // later call made from another thread.
        None => unsafe { context::resume(plan.to) },
    }
}

/// Terminates the running thread. Its control block is kept until the next
/// façade call, since this function is still running on its stack.
pub(crate) fn exit_current(cs: CriticalSection<'_>) -> ! {
    {
        let mut slot = SCHEDULER.borrow_ref_mut(cs);
        if let Some(scheduler) = slot.as_mut() {
            let running = scheduler.running();
            let _ = scheduler.terminate(running);
        }
    }
    switch(cs, Outgoing::Terminated);
    // Only reachable without a scheduler.
    std::process::exit(0)
}

/// `SIGVTALRM` handler: one quantum has elapsed.
///
/// The kernel masks the signal for the duration of the handler, so the
/// critical section below nests without unmasking.
pub(crate) extern "C" fn on_quantum_expired(_signal: libc::c_int) {
    critical_section::with(|cs| {
        let ticked = SCHEDULER
            .borrow_ref_mut(cs)
            .as_mut()
            .map(|scheduler| scheduler.tick())
            .is_some();
        if ticked {
            switch(cs, Outgoing::Suspend(ThreadState::Ready));
        }
    });
}

/// First code a spawned thread runs, entered by "returning" into it from a
/// primed context.
///
/// Arrives with preemption masked by whichever thread switched here, clears
/// the mask, runs the entry point and terminates the thread when it returns.
pub(crate) extern "C" fn thread_start() -> ! {
    let entry = critical_section::with(|cs| {
        SCHEDULER
            .borrow_ref_mut(cs)
            .as_mut()
            .and_then(Scheduler::take_running_entry)
    });
    critical::clear_mask();

    if let Some(entry) = entry {
        entry();
    }

    critical_section::with(|cs| {
        if let Ok(id) = with_initialized(cs, |scheduler| Ok(scheduler.running())) {
            log::debug!("thread {id} returned from its entry point");
        }
        exit_current(cs)
    });
    unreachable!("terminated thread was resumed")
}
