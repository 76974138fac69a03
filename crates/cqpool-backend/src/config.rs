//! Pool configuration.

use crate::env::{env_get, env_get_str};

/// Default max threads multiplier over available parallelism, used only
/// when the caller doesn't set `max_threads` explicitly.
const DEFAULT_MAX_THREADS_MULTIPLIER: usize = 4;

/// Configuration for a `Pool`.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Name used to tag spawned thread names and log lines. A process may
    /// host more than one pool instance, so this is required for
    /// debugging multi-pool deployments.
    pub name: String,

    /// Maximum number of threads allowed to be running against the
    /// worker completion queue simultaneously (I4).
    pub max_concurrency: usize,

    /// Floor on `current_threads` while the pool is not shutting down (I2).
    pub min_threads: usize,

    /// Ceiling on `current_threads` (P1).
    pub max_threads: usize,

    /// Scale-down only triggers once idle threads exceed this count.
    pub max_idle_threads: usize,

    /// Timeout for the dispatcher's per-item pickup-wait.
    pub dispatch_timeout_ms: u64,

    /// Extra pickup-wait timeout added when `current_threads == max_threads`.
    pub max_threads_dispatch_timeout_ms: u64,

    /// How often the dispatcher runs scale-down maintenance.
    pub maint_period_ms: u64,

    /// Bound on outstanding packets in the dispatch queue.
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let num_cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        Self {
            name: env_get_str("CQPOOL_NAME", "cqpool"),
            max_concurrency: num_cpus,
            min_threads: 1,
            max_threads: num_cpus.saturating_mul(DEFAULT_MAX_THREADS_MULTIPLIER).max(1),
            max_idle_threads: 1,
            dispatch_timeout_ms: env_get("CQPOOL_DISPATCH_TIMEOUT_MS", 1_000),
            max_threads_dispatch_timeout_ms: env_get("CQPOOL_MAX_THREADS_DISPATCH_TIMEOUT_MS", 500),
            maint_period_ms: env_get("CQPOOL_MAINT_PERIOD_MS", 500),
            queue_capacity: 4096,
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n;
        self
    }

    pub fn min_threads(mut self, n: usize) -> Self {
        self.min_threads = n;
        self
    }

    pub fn max_threads(mut self, n: usize) -> Self {
        self.max_threads = n;
        self
    }

    pub fn max_idle_threads(mut self, n: usize) -> Self {
        self.max_idle_threads = n;
        self
    }

    pub fn dispatch_timeout_ms(mut self, ms: u64) -> Self {
        self.dispatch_timeout_ms = ms;
        self
    }

    pub fn max_threads_dispatch_timeout_ms(mut self, ms: u64) -> Self {
        self.max_threads_dispatch_timeout_ms = ms;
        self
    }

    pub fn maint_period_ms(mut self, ms: u64) -> Self {
        self.maint_period_ms = ms;
        self
    }

    pub fn queue_capacity(mut self, n: usize) -> Self {
        self.queue_capacity = n;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.min_threads == 0 {
            return Err("min_threads must be at least 1");
        }
        if self.min_threads > self.max_threads {
            return Err("min_threads must not exceed max_threads");
        }
        if self.max_concurrency == 0 {
            return Err("max_concurrency must be at least 1");
        }
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be at least 1");
        }
        if self.dispatch_timeout_ms == 0 {
            return Err("dispatch_timeout_ms must be at least 1");
        }
        if self.maint_period_ms == 0 {
            return Err("maint_period_ms must be at least 1");
        }
        Ok(())
    }

    /// Named entry point for building a config, validating on `build()`
    /// rather than at `Pool::new` time. `PoolConfig` is already its own
    /// builder (chained setters returning `Self`), so `PoolConfigBuilder`
    /// is just that type under the name callers expect.
    pub fn builder() -> PoolConfigBuilder {
        PoolConfig::default()
    }

    /// Validate and return `self`, for use at the end of a `builder()` chain.
    pub fn build(self) -> Result<PoolConfig, &'static str> {
        self.validate()?;
        Ok(self)
    }
}

/// `PoolConfig` is its own builder; this alias is the named entry point
/// `PoolConfig::builder()` returns.
pub type PoolConfigBuilder = PoolConfig;
