//! # uthreads - User-Level Thread Scheduler
//!
//! Multiplexes independent execution contexts ("threads") onto the single
//! OS thread that calls [`init`]. A virtual interval timer (`SIGVTALRM`)
//! preempts the running thread at the end of every quantum; threads can also
//! give up the CPU explicitly by blocking, sleeping or terminating.
//!
//! ## Architecture
//!
//! **Thread table**: every live thread owns a [`Thread`] control block with a
//! private stack and a saved continuation. Thread 0 is the main thread and
//! runs on the original process stack.
//!
//! **Bookkeeping**: a FIFO ready queue and a blocked registry (sleep countdown
//! plus explicit-block flag) are the only scheduling structures. There are no
//! priorities.
//!
//! **Switch engine**: one routine performs every switch, whether it was asked
//! for by a façade call or forced by the timer signal. All scheduler state is
//! touched only while `SIGVTALRM` is masked.
//!
//! ## Module Overview
//!
//! - [`thread`] - Thread control blocks, ids and stacks
//! - [`scheduler`] - Ready queue, blocked registry and the thread table
//! - `kernel` - Context-switch engine and the process-wide scheduler
//! - [`timer`] - Preemption handler and quantum timer
//! - [`critical`] - `critical-section` implementation backed by signal masking
//! - [`api`] - Public façade
//! - [`ffi`] - C ABI with the `-1` failure convention
//!
//! ## Example
//!
//! ```no_run
//! uthreads::init(10_000).expect("init");
//! let tid = uthreads::spawn(|| {
//!     for _ in 0..3 {
//!         // work
//!     }
//! })
//! .expect("spawn");
//! assert_eq!(tid.0, 1);
//! ```

#[cfg(not(all(
    target_os = "linux",
    any(target_arch = "x86_64", target_arch = "aarch64")
)))]
compile_error!("uthreads only supports Linux on x86_64 and aarch64");

pub mod api;
pub mod config;
pub mod context;
pub mod critical;
pub mod error;
pub mod ffi;
mod kernel;
pub mod scheduler;
pub mod thread;
pub mod timer;

pub use api::{
    block, current_tid, init, init_with_config, quantums, resume, sleep, snapshot, spawn,
    terminate, thread_state, total_quantums,
};
pub use config::{Config, ConfigBuilder, DEFAULT_STACK_SIZE, MAX_THREAD_NUM, MIN_STACK_SIZE};
pub use error::{SystemError, UthreadError, UthreadResult};
pub use scheduler::{BlockedEntry, Snapshot};
pub use thread::{Thread, ThreadEntry, ThreadId, ThreadState};
