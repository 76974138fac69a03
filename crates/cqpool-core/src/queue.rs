//! Completion-queue abstraction.
//!
//! A `CompletionQueue` is a bounded-concurrency, FIFO, thread-gating
//! primitive modeled on an OS completion port: `post` enqueues a packet,
//! `wait` blocks the calling thread until a packet is available (gating
//! at most `concurrency` waiters past the gate at once), and `close`
//! wakes every blocked waiter.
//!
//! # Implementors
//!
//! - `GatedQueue` (default, in `cqpool-backend`): a `Mutex<VecDeque>` +
//!   `Condvar` FIFO paired with a counting semaphore sized to
//!   `concurrency`. Portable, no platform-specific syscalls.

use crate::entry::Packet;
use crate::error::Result;
use std::time::Duration;

/// Releases a held concurrency-gate permit when dropped.
///
/// A successful `wait()` hands back one of these alongside the packet.
/// Keep it alive for as long as the calling thread counts as "running
/// against the queue"; dropping it returns the permit to the gate.
pub struct GateGuard(Option<Box<dyn FnOnce() + Send>>);

impl GateGuard {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(release)))
    }

    /// A guard that releases nothing, for ungated implementations.
    pub fn noop() -> Self {
        Self(None)
    }
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        if let Some(release) = self.0.take() {
            release();
        }
    }
}

/// Outcome of a `wait` call.
pub enum WaitOutcome {
    /// A packet was dequeued. The queue's concurrency gate is held by the
    /// caller for as long as the accompanying `GateGuard` lives.
    Packet(Packet, GateGuard),
    /// No packet became available within the timeout.
    Timeout,
    /// The queue was closed while waiting, or was already closed.
    Closed,
}

/// A bounded-concurrency FIFO queue of `Packet`s.
///
/// **Contract:**
/// - `post` never blocks the caller.
/// - `wait` blocks up to `timeout`, gating at most `concurrency` threads
///   past it simultaneously (I4 in the pool's invariants).
/// - `close` is idempotent and wakes every blocked waiter with `Closed`.
pub trait CompletionQueue: Send + Sync {
    /// Enqueue a packet. FIFO order with respect to other `post` calls.
    fn post(&self, packet: Packet) -> Result<()>;

    /// Block the calling thread until a packet is available, `timeout`
    /// elapses, or the queue is closed.
    fn wait(&self, timeout: Duration) -> WaitOutcome;

    /// Wake every blocked waiter with `Closed` and reject further posts.
    /// Idempotent.
    fn close(&self);

    /// Number of packets currently queued (diagnostic only).
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
