//! Thread control blocks.
//!
//! A [`Thread`] owns everything the scheduler knows about one execution
//! context: its id, its scheduling state, how many quanta it has been given,
//! its private stack and the continuation to resume it from.
//!
//! Spawned threads are primed so that the first resume of their continuation
//! enters the kernel's thread trampoline on top of their own stack. The main
//! thread has neither a stack nor an entry point: it runs on the stack the
//! process started on and its continuation is only filled in the first time
//! it is switched out.

use core::fmt;

use crate::context::Context;

/// Thread identifier. Ids are small, unique while the thread is alive and
/// reused after it is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub usize);

impl ThreadId {
    /// The main thread, created implicitly at initialization.
    pub const MAIN: ThreadId = ThreadId(0);

    /// Returns true for the main thread.
    pub fn is_main(self) -> bool {
        self == Self::MAIN
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Thread scheduling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Thread is queued in the ready queue.
    Ready,
    /// Thread owns the CPU.
    Running,
    /// Thread sits in the blocked registry (explicit block and/or sleep).
    Blocked,
}

/// Thread body. Returning from it terminates the thread.
pub type ThreadEntry = Box<dyn FnOnce() + Send>;

/// Fixed-size, heap-allocated execution stack.
///
/// The buffer never moves once allocated, so a stack pointer primed into a
/// continuation stays valid for the life of the thread.
struct Stack {
    memory: Box<[u8]>,
}

impl Stack {
    fn new(size: usize) -> Self {
        Self {
            memory: vec![0u8; size].into_boxed_slice(),
        }
    }

    fn len(&self) -> usize {
        self.memory.len()
    }

    /// One past the highest usable address.
    fn top(&self) -> usize {
        self.memory.as_ptr() as usize + self.memory.len()
    }
}

/// Thread control block.
pub struct Thread {
    id: ThreadId,
    state: ThreadState,
    quantums: u64,
    stack: Option<Stack>,
    context: Context,
    entry: Option<ThreadEntry>,
}

impl Thread {
    /// Creates the control block of the main thread. It starts Running with
    /// one quantum on the books.
    pub(crate) fn main() -> Self {
        Self {
            id: ThreadId::MAIN,
            state: ThreadState::Running,
            quantums: 1,
            stack: None,
            context: Context::default(),
            entry: None,
        }
    }

    /// Creates a Ready thread that will run `entry` on a fresh stack.
    ///
    /// The quantum counter is primed to 0 so that the scheduler's increment
    /// on first dispatch brings it to 1, exactly as for a resumed thread.
    pub(crate) fn spawned(id: ThreadId, entry: ThreadEntry, stack_size: usize) -> Self {
        let stack = Stack::new(stack_size);
        // SAFETY: the stack is owned by this block and freed only with it.
        let context = unsafe { Context::primed(stack.top(), crate::kernel::thread_start) };
        Self {
            id,
            state: ThreadState::Ready,
            quantums: 0,
            stack: Some(stack),
            context,
            entry: Some(entry),
        }
    }

    /// Returns the thread ID.
    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// Returns the current thread state.
    pub fn state(&self) -> ThreadState {
        self.state
    }

    /// Number of times this thread has been scheduled into Running.
    pub fn quantums(&self) -> u64 {
        self.quantums
    }

    /// Size of the private stack, 0 for the main thread.
    pub fn stack_size(&self) -> usize {
        self.stack.as_ref().map_or(0, Stack::len)
    }

    pub(crate) fn set_state(&mut self, state: ThreadState) {
        self.state = state;
    }

    /// Marks the thread Running for one more quantum.
    pub(crate) fn dispatch(&mut self) {
        self.state = ThreadState::Running;
        self.quantums += 1;
    }

    pub(crate) fn take_entry(&mut self) -> Option<ThreadEntry> {
        self.entry.take()
    }

    pub(crate) fn context_ptr(&mut self) -> *mut Context {
        &mut self.context
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("quantums", &self.quantums)
            .field("stack_size", &self.stack_size())
            .field("has_entry", &self.entry.is_some())
            .finish()
    }
}
