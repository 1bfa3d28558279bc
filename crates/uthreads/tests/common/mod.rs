//! Helpers shared by the integration scenarios.
//!
//! Each scenario is its own binary with a plain `main`, so the scheduler and
//! the timer signal live on the process's main OS thread.

#![allow(dead_code)]

use std::time::{Duration, Instant};

/// Upper bound on any single wait. Virtual time only advances while the
/// process burns user CPU, so this is generous.
pub const DEADLINE: Duration = Duration::from_secs(20);

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Burns user time without touching the scheduler.
pub fn spin() {
    for _ in 0..10_000 {
        core::hint::spin_loop();
    }
}

/// Spins until `done` holds, panicking after [`DEADLINE`].
pub fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
    let start = Instant::now();
    while !done() {
        assert!(start.elapsed() < DEADLINE, "timed out waiting for {what}");
        spin();
    }
}

/// Spins until at least `n` more scheduling decisions have been made.
pub fn burn_quanta(n: u64) {
    let target = uthreads::total_quantums() + n;
    wait_until("scheduling decisions", || uthreads::total_quantums() >= target);
}
