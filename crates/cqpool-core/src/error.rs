//! cqpool-core error types.

use std::fmt;

#[derive(Debug)]
pub enum QueueError {
    /// The queue has been closed; no further posts or waits will succeed.
    Closed,
    /// `post` was called on a bounded queue that is at `queue_capacity`.
    Full,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "completion queue closed"),
            Self::Full => write!(f, "completion queue full"),
        }
    }
}

impl std::error::Error for QueueError {}

pub type Result<T> = std::result::Result<T, QueueError>;
