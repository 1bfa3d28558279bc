//! Round-robin example: three workers share the CPU with the main thread.
//!
//! The workers never yield on their own; the quantum timer preempts them.
//! One of them naps with `sleep` between rounds and one is blocked and
//! resumed by the main thread. Output is printed inside critical sections so
//! a preemption never interrupts a write.
//!
//! Run with `RUST_LOG=debug cargo run --example round_robin` to see the
//! scheduler's lifecycle log.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use uthreads::{Config, ThreadId};

const ROUNDS: u64 = 5;
const WORK_PER_ROUND: u64 = 2_000_000;

static DONE: [AtomicBool; 3] = [
    AtomicBool::new(false),
    AtomicBool::new(false),
    AtomicBool::new(false),
];
static WORK: AtomicU64 = AtomicU64::new(0);

fn say(line: core::fmt::Arguments<'_>) {
    critical_section::with(|_| println!("[tid {}] {}", uthreads::current_tid(), line));
}

fn busy(units: u64) {
    for _ in 0..units {
        WORK.fetch_add(1, Ordering::Relaxed);
    }
}

fn worker(slot: usize, nap: Option<u32>) {
    for round in 1..=ROUNDS {
        busy(WORK_PER_ROUND);
        say(format_args!(
            "round {round}/{ROUNDS} done after {} quanta",
            uthreads::quantums(uthreads::current_tid()).unwrap_or(0)
        ));
        if let Some(quantums) = nap {
            let _ = uthreads::sleep(quantums);
        }
    }
    DONE[slot].store(true, Ordering::SeqCst);
}

fn main() {
    env_logger::init();

    println!("=== uthreads Round-Robin Example ===\n");

    let config = Config::builder()
        .quantum_usecs(10_000)
        .stack_size(uthreads::DEFAULT_STACK_SIZE)
        .build();
    uthreads::init_with_config(config).expect("init");

    let steady = uthreads::spawn(|| worker(0, None)).expect("spawn");
    let napper = uthreads::spawn(|| worker(1, Some(3))).expect("spawn");
    let blocked = uthreads::spawn(|| worker(2, None)).expect("spawn");
    say(format_args!("spawned {steady}, {napper} and {blocked}"));

    // Hold the third worker back for a while.
    uthreads::block(blocked).expect("block");
    let held_until = uthreads::total_quantums() + 20;
    while uthreads::total_quantums() < held_until {
        busy(1_000);
    }
    say(format_args!(
        "thread {blocked} is {:?} with {} quanta; resuming it",
        uthreads::thread_state(blocked).expect("state"),
        uthreads::quantums(blocked).expect("quantums")
    ));
    uthreads::resume(blocked).expect("resume");

    while !DONE.iter().all(|done| done.load(Ordering::SeqCst)) {
        busy(1_000);
    }

    let snapshot = uthreads::snapshot().expect("snapshot");
    say(format_args!(
        "all workers finished: {} quanta in total, {} units of work, main ran {} quanta",
        snapshot.total_quantums,
        WORK.load(Ordering::Relaxed),
        uthreads::quantums(ThreadId::MAIN).expect("quantums")
    ));
    critical_section::with(|_| println!("\n=== Example Complete ==="));
    let _ = uthreads::terminate(ThreadId::MAIN);
}
