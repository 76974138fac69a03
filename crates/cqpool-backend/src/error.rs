//! Pool-level error types.

use std::fmt;

#[derive(Debug)]
pub enum PoolError {
    /// Config failed `PoolConfig::validate()`.
    InvalidConfig(&'static str),
    /// Thread spawn failed, either at construction (fatal) or during a
    /// scale-up attempt (logged, not fatal).
    SpawnFailed(std::io::Error),
    /// `submit`/`submit_empty` called after `shutdown()`.
    Rejected,
    /// The dispatch queue is at `queue_capacity`; transient backpressure,
    /// not a sign the pool is shutting down. Retryable.
    QueueFull,
    /// The user callback panicked; the panic was caught and discarded.
    CallbackFault(String),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid pool config: {}", msg),
            Self::SpawnFailed(e) => write!(f, "thread spawn failed: {}", e),
            Self::Rejected => write!(f, "pool is shut down, submission rejected"),
            Self::QueueFull => write!(f, "dispatch queue is full, submission rejected"),
            Self::CallbackFault(msg) => write!(f, "callback panicked: {}", msg),
        }
    }
}

impl std::error::Error for PoolError {}

pub type Result<T> = std::result::Result<T, PoolError>;
