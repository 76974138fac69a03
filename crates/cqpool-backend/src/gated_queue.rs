//! `GatedQueue` — default `CompletionQueue` implementation.
//!
//! A `Mutex<VecDeque<Packet>>` + `Condvar` FIFO, paired with a counting
//! semaphore sized to `concurrency`. `wait()` acquires a gate permit
//! before a packet is handed out; the permit is returned to the gate only
//! when the caller's `GateGuard` is dropped. This reproduces an OS
//! completion port's "at most `concurrency` threads running against the
//! port at once" guarantee without a kernel handle: at most `concurrency`
//! `GateGuard`s can be outstanding simultaneously.

use cqpool_core::entry::Packet;
use cqpool_core::error::{QueueError, Result};
use cqpool_core::queue::{CompletionQueue, GateGuard, WaitOutcome};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

struct GatedInner {
    queue: Mutex<VecDeque<Packet>>,
    queue_cond: Condvar,
    closed: AtomicBool,
    capacity: usize,

    gate_permits: Mutex<usize>,
    gate_cond: Condvar,
}

impl GatedInner {
    /// Block up to `timeout` for a permit. Returns false on timeout; the
    /// caller must re-check `closed` to distinguish timeout from shutdown.
    fn acquire_gate(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut permits = self.gate_permits.lock().unwrap();
        loop {
            if *permits > 0 {
                *permits -= 1;
                return true;
            }
            if self.closed.load(Ordering::Acquire) {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, result) = self
                .gate_cond
                .wait_timeout(permits, deadline - now)
                .unwrap();
            permits = guard;
            if result.timed_out() && *permits == 0 {
                return false;
            }
        }
    }

    fn release_gate(&self) {
        let mut permits = self.gate_permits.lock().unwrap();
        *permits += 1;
        self.gate_cond.notify_one();
    }
}

/// Default `CompletionQueue` backend: bounded FIFO gated to `concurrency`
/// simultaneous waiters past the gate.
pub struct GatedQueue {
    inner: Arc<GatedInner>,
}

impl GatedQueue {
    pub fn new(concurrency: usize, capacity: usize) -> Self {
        Self {
            inner: Arc::new(GatedInner {
                queue: Mutex::new(VecDeque::new()),
                queue_cond: Condvar::new(),
                closed: AtomicBool::new(false),
                capacity,
                gate_permits: Mutex::new(concurrency),
                gate_cond: Condvar::new(),
            }),
        }
    }
}

impl Clone for GatedQueue {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl CompletionQueue for GatedQueue {
    fn post(&self, packet: Packet) -> Result<()> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(QueueError::Closed);
        }
        {
            let mut q = self.inner.queue.lock().unwrap();
            if q.len() >= self.inner.capacity {
                return Err(QueueError::Full);
            }
            q.push_back(packet);
        }
        self.inner.queue_cond.notify_one();
        Ok(())
    }

    fn wait(&self, timeout: Duration) -> WaitOutcome {
        if self.inner.closed.load(Ordering::Acquire) {
            return WaitOutcome::Closed;
        }

        let deadline = Instant::now() + timeout;

        if !self.inner.acquire_gate(timeout) {
            return if self.inner.closed.load(Ordering::Acquire) {
                WaitOutcome::Closed
            } else {
                WaitOutcome::Timeout
            };
        }

        if self.inner.closed.load(Ordering::Acquire) {
            self.inner.release_gate();
            return WaitOutcome::Closed;
        }

        let mut q = self.inner.queue.lock().unwrap();
        loop {
            if let Some(packet) = q.pop_front() {
                let inner = Arc::clone(&self.inner);
                return WaitOutcome::Packet(packet, GateGuard::new(move || inner.release_gate()));
            }
            if self.inner.closed.load(Ordering::Acquire) {
                drop(q);
                self.inner.release_gate();
                return WaitOutcome::Closed;
            }
            let now = Instant::now();
            if now >= deadline {
                drop(q);
                self.inner.release_gate();
                return WaitOutcome::Timeout;
            }
            let (guard, result) = self.inner.queue_cond.wait_timeout(q, deadline - now).unwrap();
            q = guard;
            if result.timed_out() && q.is_empty() {
                drop(q);
                self.inner.release_gate();
                return WaitOutcome::Timeout;
            }
        }
    }

    fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.queue_cond.notify_all();
        self.inner.gate_cond.notify_all();
    }

    fn len(&self) -> usize {
        self.inner.queue.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cqpool_core::entry::{Key, Packet};
    use std::thread;

    #[test]
    fn post_then_wait_delivers_fifo() {
        let q = GatedQueue::new(4, 16);
        q.post(Packet::normal(Some(vec![1].into_boxed_slice()))).unwrap();
        q.post(Packet::normal(Some(vec![2].into_boxed_slice()))).unwrap();

        match q.wait(Duration::from_millis(100)) {
            WaitOutcome::Packet(p, _guard) => {
                assert_eq!(p.payload.unwrap()[0], 1);
            }
            _ => panic!("expected packet"),
        }
        match q.wait(Duration::from_millis(100)) {
            WaitOutcome::Packet(p, _guard) => {
                assert_eq!(p.payload.unwrap()[0], 2);
            }
            _ => panic!("expected packet"),
        }
    }

    #[test]
    fn wait_times_out_when_empty() {
        let q = GatedQueue::new(4, 16);
        match q.wait(Duration::from_millis(20)) {
            WaitOutcome::Timeout => {}
            _ => panic!("expected timeout"),
        }
    }

    #[test]
    fn gate_caps_concurrent_waiters() {
        let q = GatedQueue::new(1, 16);
        q.post(Packet::shutdown()).unwrap();
        q.post(Packet::shutdown()).unwrap();

        let held = match q.wait(Duration::from_millis(100)) {
            WaitOutcome::Packet(_, guard) => guard,
            _ => panic!("expected packet"),
        };

        // concurrency == 1, so a second wait should time out while the
        // first guard is still held.
        match q.wait(Duration::from_millis(30)) {
            WaitOutcome::Timeout => {}
            _ => panic!("expected second waiter to be gated out"),
        }

        drop(held);

        match q.wait(Duration::from_millis(100)) {
            WaitOutcome::Packet(p, _guard) => assert_eq!(p.key, Key::Shutdown),
            _ => panic!("expected packet after permit release"),
        }
    }

    #[test]
    fn close_wakes_blocked_waiter() {
        let q = GatedQueue::new(4, 16);
        let q2 = q.clone();
        let handle = thread::spawn(move || q2.wait(Duration::from_secs(5)));
        thread::sleep(Duration::from_millis(20));
        q.close();
        match handle.join().unwrap() {
            WaitOutcome::Closed => {}
            _ => panic!("expected closed"),
        }
    }

    #[test]
    fn post_after_close_rejected() {
        let q = GatedQueue::new(4, 16);
        q.close();
        match q.post(Packet::normal(None)) {
            Err(QueueError::Closed) => {}
            _ => panic!("expected closed error"),
        }
    }

    #[test]
    fn post_respects_capacity() {
        let q = GatedQueue::new(4, 1);
        q.post(Packet::normal(None)).unwrap();
        match q.post(Packet::normal(None)) {
            Err(QueueError::Full) => {}
            _ => panic!("expected full error"),
        }
    }
}
