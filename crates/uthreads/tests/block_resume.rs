//! Explicit blocking of other threads and of the caller, and termination of
//! Blocked threads.

mod common;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use uthreads::{ThreadId, ThreadState, UthreadError};

static PROGRESS: AtomicU64 = AtomicU64::new(0);
static STOP: AtomicBool = AtomicBool::new(false);
static SELF_BLOCK_PASSED: AtomicBool = AtomicBool::new(false);

fn counter() {
    while !STOP.load(Ordering::Acquire) {
        PROGRESS.fetch_add(1, Ordering::Relaxed);
        core::hint::spin_loop();
    }
}

fn self_blocker() {
    uthreads::block(uthreads::current_tid()).unwrap();
    SELF_BLOCK_PASSED.store(true, Ordering::SeqCst);
}

fn block_running_peer() {
    let tid = uthreads::spawn(counter).unwrap();
    common::wait_until("the counter to start", || PROGRESS.load(Ordering::Relaxed) > 0);

    uthreads::block(tid).unwrap();
    assert_eq!(uthreads::thread_state(tid), Ok(ThreadState::Blocked));
    let frozen = PROGRESS.load(Ordering::Relaxed);
    let dispatched = uthreads::quantums(tid).unwrap();

    common::burn_quanta(5);
    assert_eq!(PROGRESS.load(Ordering::Relaxed), frozen);
    assert_eq!(uthreads::quantums(tid), Ok(dispatched));
    assert_eq!(uthreads::thread_state(tid), Ok(ThreadState::Blocked));

    uthreads::resume(tid).unwrap();
    common::wait_until("the counter to run again", || {
        PROGRESS.load(Ordering::Relaxed) > frozen
    });
    assert!(uthreads::quantums(tid).unwrap() > dispatched);

    // Blocked threads can be terminated; their registry entry goes with them.
    uthreads::block(tid).unwrap();
    uthreads::terminate(tid).unwrap();
    let snap = uthreads::snapshot().unwrap();
    assert!(snap.blocked.is_empty());
    assert!(!snap.ready.contains(&tid));
    assert_eq!(uthreads::resume(tid), Err(UthreadError::NoSuchThread(tid)));
}

fn block_self() {
    let tid = uthreads::spawn(self_blocker).unwrap();
    common::wait_until("the thread to block itself", || {
        uthreads::thread_state(tid) == Ok(ThreadState::Blocked)
    });
    assert!(uthreads::quantums(tid).unwrap() >= 1);

    common::burn_quanta(5);
    assert!(!SELF_BLOCK_PASSED.load(Ordering::SeqCst));

    uthreads::resume(tid).unwrap();
    common::wait_until("the thread to continue", || {
        SELF_BLOCK_PASSED.load(Ordering::SeqCst)
    });
    common::wait_until("the thread to exit", || uthreads::thread_state(tid).is_err());
}

fn block_before_first_run() {
    let tid = critical_section::with(|_| {
        let tid = uthreads::spawn(|| {}).unwrap();
        uthreads::block(tid).unwrap();
        tid
    });
    common::burn_quanta(5);
    assert_eq!(uthreads::quantums(tid), Ok(0));
    assert_eq!(uthreads::thread_state(tid), Ok(ThreadState::Blocked));

    uthreads::resume(tid).unwrap();
    common::wait_until("the thread to run and exit", || {
        uthreads::thread_state(tid).is_err()
    });
}

fn main() {
    common::init_logging();
    uthreads::init(2_000).unwrap();

    block_running_peer();
    block_self();
    block_before_first_run();

    STOP.store(true, Ordering::Release);
    assert_eq!(uthreads::current_tid(), ThreadId::MAIN);
    assert_eq!(uthreads::block(ThreadId::MAIN), Err(UthreadError::BlockMainThread));
    println!("block_resume: ok ({} quanta)", uthreads::total_quantums());
}
