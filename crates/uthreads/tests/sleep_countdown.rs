//! Exact tick accounting of `sleep`, and its interaction with `block`.
//!
//! A sleeping thread counts timer expirations down, checking after each
//! decrement; it is dispatched again in the scheduling decision of the
//! expiry that brings the count to zero. With only the main thread left to
//! run, that is `n + 1` scheduling decisions after it went to sleep: one for
//! leaving the CPU and one per expiry.

mod common;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use uthreads::{ThreadId, ThreadState};

const NAP: u32 = 3;

static TOTAL_BEFORE: AtomicU64 = AtomicU64::new(0);
static TOTAL_AFTER: AtomicU64 = AtomicU64::new(0);
static OWN_BEFORE: AtomicU64 = AtomicU64::new(0);
static OWN_AFTER: AtomicU64 = AtomicU64::new(0);
static NAPPED: AtomicBool = AtomicBool::new(false);

const HELD_NAP: u32 = 3;
static HELD_DONE: AtomicBool = AtomicBool::new(false);

fn napper() {
    // Masked around the measurement so the only decisions counted are the
    // ones the sleep causes.
    critical_section::with(|_| {
        let me = uthreads::current_tid();
        TOTAL_BEFORE.store(uthreads::total_quantums(), Ordering::SeqCst);
        OWN_BEFORE.store(uthreads::quantums(me).unwrap(), Ordering::SeqCst);

        uthreads::sleep(NAP).unwrap();

        TOTAL_AFTER.store(uthreads::total_quantums(), Ordering::SeqCst);
        OWN_AFTER.store(uthreads::quantums(me).unwrap(), Ordering::SeqCst);
    });
    NAPPED.store(true, Ordering::SeqCst);
}

fn exact_countdown() {
    let tid = uthreads::spawn(napper).unwrap();
    common::wait_until("the napper to wake", || NAPPED.load(Ordering::SeqCst));

    let before = TOTAL_BEFORE.load(Ordering::SeqCst);
    let after = TOTAL_AFTER.load(Ordering::SeqCst);
    assert_eq!(after - before, u64::from(NAP) + 1);
    assert_eq!(
        OWN_AFTER.load(Ordering::SeqCst) - OWN_BEFORE.load(Ordering::SeqCst),
        1,
        "a sleeping thread must not be dispatched"
    );

    common::wait_until("the napper to exit", || uthreads::thread_state(tid).is_err());
}

fn held() {
    uthreads::sleep(HELD_NAP).unwrap();
    HELD_DONE.store(true, Ordering::SeqCst);
}

fn block_outlasts_sleep() {
    let tid = uthreads::spawn(held).unwrap();

    // Block it while the countdown is still running. The check and the block
    // share one critical section so no expiry lands between them.
    common::wait_until("the sleeper to go to sleep", || {
        critical_section::with(|_| {
            let entry = uthreads::snapshot()
                .unwrap()
                .blocked
                .into_iter()
                .find(|(blocked, _)| *blocked == tid);
            match entry {
                Some((_, entry)) => {
                    assert!(!entry.explicitly_blocked);
                    uthreads::block(tid).unwrap();
                    true
                }
                None => false,
            }
        })
    });

    // Long past the nap, it is still held.
    common::burn_quanta(u64::from(HELD_NAP) * 4);
    assert_eq!(uthreads::thread_state(tid), Ok(ThreadState::Blocked));
    assert!(!HELD_DONE.load(Ordering::SeqCst));
    let snap = uthreads::snapshot().unwrap();
    let (_, entry) = snap
        .blocked
        .iter()
        .find(|(blocked, _)| *blocked == tid)
        .copied()
        .unwrap();
    assert!(entry.explicitly_blocked);
    assert!(entry.countdown_expired());

    // Countdown over, so resume makes it Ready at once.
    critical_section::with(|_| {
        uthreads::resume(tid).unwrap();
        assert_eq!(uthreads::thread_state(tid), Ok(ThreadState::Ready));
    });
    common::wait_until("the sleeper to finish", || HELD_DONE.load(Ordering::SeqCst));
}

fn main() {
    common::init_logging();
    uthreads::init(5_000).unwrap();

    exact_countdown();
    block_outlasts_sleep();

    assert_eq!(uthreads::current_tid(), ThreadId::MAIN);
    println!("sleep_countdown: ok ({} quanta)", uthreads::total_quantums());
}
