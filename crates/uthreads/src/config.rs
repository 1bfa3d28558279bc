//! Scheduler configuration.

use crate::error::UthreadError;

/// Maximum number of concurrently alive threads, main thread included.
pub const MAX_THREAD_NUM: usize = 100;

/// Default size of a spawned thread's private stack.
pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

/// Smallest stack accepted by [`Config`]. The trampoline, the façade and the
/// timer signal frame all land on the thread stack.
pub const MIN_STACK_SIZE: usize = 16 * 1024;

/// Configuration for the scheduler.
///
/// Fixed at [`init_with_config`](crate::init_with_config); there is no
/// reconfiguration afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Length of one quantum in microseconds of process virtual time.
    pub quantum_usecs: u32,
    /// Size in bytes of every spawned thread's stack.
    pub stack_size: usize,
    /// Thread table size, main thread included.
    pub max_threads: usize,
}

impl Config {
    /// Creates a configuration with the given quantum and default sizing.
    pub fn new(quantum_usecs: u32) -> Self {
        Self {
            quantum_usecs,
            stack_size: DEFAULT_STACK_SIZE,
            max_threads: MAX_THREAD_NUM,
        }
    }

    /// Creates a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Checks every field against its valid range.
    pub fn validate(&self) -> Result<(), UthreadError> {
        if self.quantum_usecs == 0 {
            return Err(UthreadError::NonPositiveQuantum);
        }
        if self.stack_size < MIN_STACK_SIZE {
            return Err(UthreadError::InvalidConfig("stack size below minimum"));
        }
        if self.max_threads == 0 || self.max_threads > MAX_THREAD_NUM {
            return Err(UthreadError::InvalidConfig(
                "thread limit outside 1..=MAX_THREAD_NUM",
            ));
        }
        Ok(())
    }
}

/// Builder for ergonomic configuration construction.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            config: Config::new(0),
        }
    }
}

impl ConfigBuilder {
    /// Sets the quantum length in microseconds.
    pub fn quantum_usecs(mut self, usecs: u32) -> Self {
        self.config.quantum_usecs = usecs;
        self
    }

    /// Sets the per-thread stack size in bytes.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = size;
        self
    }

    /// Sets the thread table size.
    pub fn max_threads(mut self, max: usize) -> Self {
        self.config.max_threads = max;
        self
    }

    /// Builds the configuration. Validation happens at initialization.
    pub fn build(self) -> Config {
        self.config
    }
}
