//! Scheduling bookkeeping.
//!
//! The [`Scheduler`] owns the thread table and the two structures that
//! decide who runs next:
//!
//! - the ready queue, a FIFO of Ready threads and the only scheduling order;
//! - the blocked registry, mapping each Blocked thread to its remaining sleep
//!   countdown and whether an explicit block is holding it.
//!
//! Everything here is plain state manipulation. Control transfer lives in
//! [`kernel`](crate::kernel), which asks [`Scheduler::plan_switch`] for the
//! continuations to save and resume. The ready queue and registry are
//! fixed-capacity so the timer path never allocates.
//!
//! ## Scheduling Policy
//!
//! 1. A thread leaving the CPU as Ready goes to the tail of the ready queue
//! 2. The head of the ready queue runs next
//! 3. Every dispatch increments the thread's quantum count and the total
//! 4. Each timer expiry decrements every sleep countdown; a countdown below 1
//!    with no explicit block outstanding makes the thread Ready again

use heapless::{Deque, FnvIndexMap};

use crate::config::{Config, MAX_THREAD_NUM};
use crate::context::Context;
use crate::error::UthreadError;
use crate::thread::{Thread, ThreadEntry, ThreadId, ThreadState};
use crate::timer::Quantum;

/// Smallest countdown value that still keeps a sleeping thread Blocked.
const MIN_VALID_QUANTUM: u32 = 1;

/// Registry capacity, the power of two above `MAX_THREAD_NUM`.
const REGISTRY_CAPACITY: usize = 128;

/// Why a thread is in the blocked registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockedEntry {
    /// Timer expiries left before a sleep ends.
    pub quantums_remaining: u32,
    /// An explicit block is outstanding; only `resume` clears it.
    pub explicitly_blocked: bool,
}

impl BlockedEntry {
    fn explicit() -> Self {
        Self {
            quantums_remaining: 0,
            explicitly_blocked: true,
        }
    }

    fn sleeping(quantums: u32) -> Self {
        Self {
            quantums_remaining: quantums,
            explicitly_blocked: false,
        }
    }

    /// The sleep part of the entry no longer holds the thread.
    pub fn countdown_expired(&self) -> bool {
        self.quantums_remaining < MIN_VALID_QUANTUM
    }
}

/// FIFO of Ready threads.
#[derive(Default)]
struct ReadyQueue {
    queue: Deque<ThreadId, MAX_THREAD_NUM>,
}

impl ReadyQueue {
    fn push(&mut self, id: ThreadId) {
        debug_assert!(!self.contains(id), "thread {id} queued twice");
        // Each live thread is queued at most once and at most
        // MAX_THREAD_NUM threads are alive.
        let pushed = self.queue.push_back(id);
        debug_assert!(pushed.is_ok(), "ready queue overflow");
    }

    fn pop(&mut self) -> Option<ThreadId> {
        self.queue.pop_front()
    }

    /// Removes `id`, preserving the order of the others.
    fn remove(&mut self, id: ThreadId) -> bool {
        let mut found = false;
        for _ in 0..self.queue.len() {
            if let Some(front) = self.queue.pop_front() {
                if front == id && !found {
                    found = true;
                } else {
                    let _ = self.queue.push_back(front);
                }
            }
        }
        found
    }

    fn contains(&self, id: ThreadId) -> bool {
        self.queue.iter().any(|queued| *queued == id)
    }

    fn iter(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.queue.iter().copied()
    }
}

/// Blocked threads and what holds each of them.
#[derive(Default)]
struct BlockedRegistry {
    entries: FnvIndexMap<ThreadId, BlockedEntry, REGISTRY_CAPACITY>,
}

impl BlockedRegistry {
    fn insert(&mut self, id: ThreadId, entry: BlockedEntry) {
        let inserted = self.entries.insert(id, entry);
        debug_assert!(inserted.is_ok(), "blocked registry overflow");
    }

    fn get(&self, id: ThreadId) -> Option<&BlockedEntry> {
        self.entries.get(&id)
    }

    fn get_mut(&mut self, id: ThreadId) -> Option<&mut BlockedEntry> {
        self.entries.get_mut(&id)
    }

    fn remove(&mut self, id: ThreadId) -> Option<BlockedEntry> {
        self.entries.remove(&id)
    }

    /// Counts one timer expiry down on every entry and drops the entries whose
    /// sleep is over and that no explicit block holds. Returns the woken ids.
    fn tick(&mut self) -> heapless::Vec<ThreadId, REGISTRY_CAPACITY> {
        let mut woken = heapless::Vec::new();
        for (id, entry) in self.entries.iter_mut() {
            entry.quantums_remaining = entry.quantums_remaining.saturating_sub(1);
            if entry.countdown_expired() && !entry.explicitly_blocked {
                let _ = woken.push(*id);
            }
        }
        for id in &woken {
            self.entries.remove(id);
        }
        woken
    }

    fn iter(&self) -> impl Iterator<Item = (ThreadId, BlockedEntry)> + '_ {
        self.entries.iter().map(|(id, entry)| (*id, *entry))
    }
}

/// How the running thread leaves the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outgoing {
    /// It stays alive in the given state (Ready or Blocked).
    Suspend(ThreadState),
    /// It has been retired and must never be resumed.
    Terminated,
}

/// Continuations for one switch, computed with the scheduler borrowed and
/// used after the borrow ends.
#[derive(Debug)]
pub(crate) struct SwitchPlan {
    pub from: Option<*mut Context>,
    pub to: *const Context,
    pub next: ThreadId,
}

/// Result of blocking a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    /// The thread was not running; nothing else to do.
    Blocked,
    /// The caller blocked itself and must switch away as Blocked.
    SwitchRequired,
}

/// Result of removing a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The thread was Ready or Blocked and has been freed.
    Removed,
    /// The running thread was retired; the caller must switch away without
    /// saving its continuation.
    Running,
}

/// Point-in-time view of the scheduling structures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub running: ThreadId,
    pub ready: Vec<ThreadId>,
    pub blocked: Vec<(ThreadId, BlockedEntry)>,
    pub total_quantums: u64,
}

/// Thread table plus ready/blocked bookkeeping.
pub struct Scheduler {
    threads: Vec<Option<Box<Thread>>>,
    ready: ReadyQueue,
    blocked: BlockedRegistry,
    running: ThreadId,
    total_quantums: u64,
    quantum: Quantum,
    stack_size: usize,
    /// A thread that terminated itself. Its stack was in use at the time, so
    /// it is freed on a later call instead.
    retired: Option<Box<Thread>>,
}

impl Scheduler {
    /// Creates the scheduler with the main thread Running.
    pub fn new(config: &Config) -> Self {
        let mut threads: Vec<Option<Box<Thread>>> = Vec::with_capacity(config.max_threads);
        threads.resize_with(config.max_threads, || None);
        threads[ThreadId::MAIN.0] = Some(Box::new(Thread::main()));

        Self {
            threads,
            ready: ReadyQueue::default(),
            blocked: BlockedRegistry::default(),
            running: ThreadId::MAIN,
            total_quantums: 1,
            quantum: Quantum::from_usecs(config.quantum_usecs),
            stack_size: config.stack_size,
            retired: None,
        }
    }

    pub fn quantum(&self) -> Quantum {
        self.quantum
    }

    pub fn running(&self) -> ThreadId {
        self.running
    }

    pub fn total_quantums(&self) -> u64 {
        self.total_quantums
    }

    /// Number of live threads, main included.
    pub fn live_threads(&self) -> usize {
        self.threads.iter().filter(|slot| slot.is_some()).count()
    }

    /// Looks up a live thread.
    pub fn thread(&self, id: ThreadId) -> Result<&Thread, UthreadError> {
        self.threads
            .get(id.0)
            .and_then(|slot| slot.as_deref())
            .ok_or(UthreadError::NoSuchThread(id))
    }

    fn thread_mut(&mut self, id: ThreadId) -> Result<&mut Thread, UthreadError> {
        self.threads
            .get_mut(id.0)
            .and_then(|slot| slot.as_deref_mut())
            .ok_or(UthreadError::NoSuchThread(id))
    }

    pub fn contains(&self, id: ThreadId) -> bool {
        self.thread(id).is_ok()
    }

    /// Smallest unused id, if the table has room.
    pub fn available_tid(&self) -> Option<ThreadId> {
        self.threads
            .iter()
            .position(Option::is_none)
            .map(ThreadId)
    }

    /// Creates a Ready thread running `entry` and queues it.
    pub fn spawn(&mut self, entry: ThreadEntry) -> Result<ThreadId, UthreadError> {
        let id = self
            .available_tid()
            .ok_or(UthreadError::ThreadLimitReached(self.live_threads()))?;
        self.threads[id.0] = Some(Box::new(Thread::spawned(id, entry, self.stack_size)));
        self.ready.push(id);
        Ok(id)
    }

    /// Destroys `id`, detaching it from whichever structure holds it.
    ///
    /// The main thread is not special-cased here; ending the process is the
    /// caller's decision.
    pub fn terminate(&mut self, id: ThreadId) -> Result<Termination, UthreadError> {
        let state = self.thread(id)?.state();
        let thread = self.threads[id.0].take();
        match state {
            ThreadState::Ready => {
                self.ready.remove(id);
                Ok(Termination::Removed)
            }
            ThreadState::Blocked => {
                self.blocked.remove(id);
                Ok(Termination::Removed)
            }
            ThreadState::Running => {
                self.retired = thread;
                Ok(Termination::Running)
            }
        }
    }

    /// Frees a thread that terminated itself. Must not be called on its stack.
    pub fn reap(&mut self) {
        self.retired = None;
    }

    /// Blocks `id`. An already Blocked thread keeps its sleep countdown and
    /// gains the explicit flag.
    pub fn block(&mut self, id: ThreadId) -> Result<BlockOutcome, UthreadError> {
        let state = self.thread(id)?.state();
        if id.is_main() {
            return Err(UthreadError::BlockMainThread);
        }
        match state {
            ThreadState::Ready => {
                self.ready.remove(id);
                self.thread_mut(id)?.set_state(ThreadState::Blocked);
                self.blocked.insert(id, BlockedEntry::explicit());
                Ok(BlockOutcome::Blocked)
            }
            ThreadState::Blocked => {
                match self.blocked.get_mut(id) {
                    Some(entry) => entry.explicitly_blocked = true,
                    None => self.blocked.insert(id, BlockedEntry::explicit()),
                }
                Ok(BlockOutcome::Blocked)
            }
            ThreadState::Running => {
                self.blocked.insert(id, BlockedEntry::explicit());
                Ok(BlockOutcome::SwitchRequired)
            }
        }
    }

    /// Records a sleep of `quantums` timer expiries for the running thread.
    /// The caller must then switch away as Blocked.
    pub fn sleep_running(&mut self, quantums: u32) -> Result<(), UthreadError> {
        if quantums < MIN_VALID_QUANTUM {
            return Err(UthreadError::NonPositiveSleep);
        }
        if self.running.is_main() {
            return Err(UthreadError::SleepMainThread);
        }
        self.blocked.insert(self.running, BlockedEntry::sleeping(quantums));
        Ok(())
    }

    /// Lifts an explicit block. A thread whose sleep is already over becomes
    /// Ready at once; one still counting down wakes when the countdown ends.
    /// Threads that are not Blocked are left alone.
    pub fn resume(&mut self, id: ThreadId) -> Result<(), UthreadError> {
        self.thread(id)?;
        let Some(entry) = self.blocked.get_mut(id) else {
            return Ok(());
        };
        if entry.countdown_expired() {
            self.blocked.remove(id);
            self.thread_mut(id)?.set_state(ThreadState::Ready);
            self.ready.push(id);
        } else {
            entry.explicitly_blocked = false;
        }
        Ok(())
    }

    /// Accounts for one timer expiry: advances every sleep countdown and
    /// moves the threads it frees to the ready queue, in registry order.
    pub fn tick(&mut self) -> usize {
        let woken = self.blocked.tick();
        for id in &woken {
            if let Some(Some(thread)) = self.threads.get_mut(id.0) {
                thread.set_state(ThreadState::Ready);
            }
            self.ready.push(*id);
        }
        woken.len()
    }

    /// Performs the bookkeeping of one switch: parks the outgoing thread,
    /// dispatches the head of the ready queue and returns the continuations
    /// to save and resume.
    ///
    /// # Panics
    ///
    /// If the ready queue is empty. The main thread can never block, so it is
    /// always either running or queued when a decision is made.
    pub(crate) fn plan_switch(&mut self, outgoing: Outgoing) -> SwitchPlan {
        let current = self.running;
        let from = match outgoing {
            Outgoing::Suspend(state) => {
                let thread = self
                    .thread_mut(current)
                    .expect("running thread missing from the table");
                thread.set_state(state);
                let from = thread.context_ptr();
                if state == ThreadState::Ready {
                    self.ready.push(current);
                }
                Some(from)
            }
            Outgoing::Terminated => None,
        };

        let next = self
            .ready
            .pop()
            .expect("ready queue empty at a scheduling decision");
        let thread = self
            .thread_mut(next)
            .expect("queued thread missing from the table");
        thread.dispatch();
        let to = thread.context_ptr() as *const Context;
        self.running = next;
        self.total_quantums += 1;

        SwitchPlan { from, to, next }
    }

    /// Hands the running thread's entry point to its trampoline.
    pub(crate) fn take_running_entry(&mut self) -> Option<ThreadEntry> {
        let running = self.running;
        self.thread_mut(running).ok()?.take_entry()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            running: self.running,
            ready: self.ready.iter().collect(),
            blocked: self.blocked.iter().collect(),
            total_quantums: self.total_quantums,
        }
    }

    /// Registry entry of a Blocked thread.
    pub fn blocked_entry(&self, id: ThreadId) -> Option<BlockedEntry> {
        self.blocked.get(id).copied()
    }
}
