//! `Pool` — the elastic, completion-queue-gated thread pool.
//!
//! Wires a dispatch-side `GatedQueue` (concurrency 1) and a worker-side
//! `GatedQueue` (concurrency `max_concurrency`) together with a dedicated
//! dispatcher thread and a pool of worker threads, following the
//! dispatch/worker pipeline described in the module doc of `cqpool`.

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::gated_queue::GatedQueue;

use cqpool_core::entry::{Key, Packet};
use cqpool_core::queue::{CompletionQueue, WaitOutcome};

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

thread_local! {
    /// Holds the address of the `PoolInner` whose `worker_loop` is
    /// currently running on this thread, for the lifetime of that call.
    /// Lets `shutdown()`/`Drop` detect a call made on *that specific
    /// pool* from inside one of its own running callbacks and skip the
    /// blocking drain, since that thread can only reach `current_threads
    /// == 0` by returning from the callback it is currently inside.
    /// Keyed by address rather than a plain bool so a callback that calls
    /// into a different, unrelated `Pool` isn't mistaken for reentrancy —
    /// that call has no deadlock risk and must still block normally.
    static IN_POOL_WORKER: std::cell::Cell<Option<usize>> = const { std::cell::Cell::new(None) };
}

fn is_reentrant_on(inner: &Arc<PoolInner>) -> bool {
    let addr = Arc::as_ptr(inner) as usize;
    IN_POOL_WORKER.with(|flag| flag.get() == Some(addr))
}

/// `disposed` is checked separately by the caller before posting, so by
/// the time `post()` fails here it can only be `Full` (a `disposed` pool
/// also closes `dispatch_queue`, but that race is vanishingly narrow and
/// still correctly reported as `Rejected` below) or a shutdown that raced
/// in between the check and the post.
fn queue_error_to_pool_error(err: cqpool_core::error::QueueError) -> PoolError {
    match err {
        cqpool_core::error::QueueError::Full => PoolError::QueueFull,
        cqpool_core::error::QueueError::Closed => PoolError::Rejected,
    }
}

/// Tracks how many `Key::Normal` packets have been dequeued from the worker
/// queue, in the queue's own FIFO order. The dispatcher waits on this count
/// reaching the FIFO position of the specific packet it just posted, rather
/// than on a blind "something was picked up" signal — a shared generation
/// bump can't distinguish a stale, still-queued packet being picked up from
/// the packet the current `dispatch_one` call actually cares about, and
/// would wrongly report pickup for the wrong item. Since the queue is
/// strictly FIFO, "N packets popped" implies every packet at position ≤ N
/// has already been popped, so waiting on the count is equivalent to
/// waiting on that specific packet without needing to tag packets with ids.
struct DispatchSignal {
    popped_seq: Mutex<u64>,
    cond: Condvar,
}

impl DispatchSignal {
    fn new() -> Self {
        Self { popped_seq: Mutex::new(0), cond: Condvar::new() }
    }

    /// Record that a `Key::Normal` packet was dequeued by a worker.
    fn record_pickup(&self) {
        let mut seq = self.popped_seq.lock().unwrap();
        *seq = seq.wrapping_add(1);
        self.cond.notify_all();
    }

    /// Returns true if `target` or more pickups have been recorded before
    /// `timeout` elapsed.
    fn wait_for_pickup(&self, target: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut seq = self.popped_seq.lock().unwrap();
        while *seq < target {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, result) = self.cond.wait_timeout(seq, deadline - now).unwrap();
            seq = guard;
            if result.timed_out() && *seq < target {
                return false;
            }
        }
        true
    }
}

struct PoolInner {
    config: PoolConfig,
    dispatch_queue: GatedQueue,
    worker_queue: GatedQueue,
    dispatch_complete: DispatchSignal,
    next_dispatch_seq: AtomicU64,

    current_threads: AtomicUsize,
    active_threads: AtomicUsize,
    /// Shutdown sentinels posted by `run_maintenance` that no worker has
    /// consumed yet. Tracked separately from `current_threads` because
    /// that only drops once a targeted worker actually wakes up and
    /// exits, which can lag a maintenance tick by more than
    /// `maint_period_ms`; without this, successive ticks would each
    /// recompute the scale-down amount from the same stale
    /// `current_threads` and stack sentinels past `min_threads`.
    /// `worker_loop` decrements this on any shutdown sentinel it
    /// consumes, including ones posted by `shutdown()`/
    /// `teardown_partial_construction` rather than maintenance — those
    /// only run after `disposed` is already set, by which point
    /// `min_threads` is no longer a floor this counter needs to protect,
    /// so the cross-contamination is harmless.
    pending_scale_down: AtomicUsize,
    disposed: AtomicBool,
    healthy: AtomicBool,
    last_fault: Mutex<Option<String>>,

    next_worker_id: AtomicUsize,
    worker_handles: Mutex<Vec<JoinHandle<()>>>,
    dispatcher_handle: Mutex<Option<JoinHandle<()>>>,

    callback: Box<dyn Fn(Option<Box<[u8]>>) + Send + Sync>,
}

/// An elastic, completion-queue-gated thread pool.
///
/// See the crate-level documentation for the dispatch/worker pipeline
/// this drives.
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// Construct a pool and start its dispatcher and `min_threads` workers.
    ///
    /// Fails only on invalid config or thread-spawn failure; neither
    /// panics.
    pub fn new<F>(config: PoolConfig, callback: F) -> Result<Pool, PoolError>
    where
        F: Fn(Option<Box<[u8]>>) + Send + Sync + 'static,
    {
        config.validate().map_err(PoolError::InvalidConfig)?;

        let worker_capacity = config
            .queue_capacity
            .max(config.max_threads.saturating_mul(2) + 16);
        let dispatch_queue = GatedQueue::new(1, config.queue_capacity);
        let worker_queue = GatedQueue::new(config.max_concurrency, worker_capacity);

        let inner = Arc::new(PoolInner {
            config: config.clone(),
            dispatch_queue,
            worker_queue,
            dispatch_complete: DispatchSignal::new(),
            next_dispatch_seq: AtomicU64::new(0),
            current_threads: AtomicUsize::new(0),
            active_threads: AtomicUsize::new(0),
            pending_scale_down: AtomicUsize::new(0),
            disposed: AtomicBool::new(false),
            healthy: AtomicBool::new(true),
            last_fault: Mutex::new(None),
            next_worker_id: AtomicUsize::new(0),
            worker_handles: Mutex::new(Vec::new()),
            dispatcher_handle: Mutex::new(None),
            callback: Box::new(callback),
        });

        for _ in 0..config.min_threads {
            if let Err(e) = spawn_worker(&inner) {
                teardown_partial_construction(&inner);
                return Err(PoolError::SpawnFailed(e));
            }
        }

        let dispatcher_inner = Arc::clone(&inner);
        let name = format!("{}-dispatcher", config.name);
        let handle = match thread::Builder::new().name(name).spawn(move || run_dispatcher(dispatcher_inner)) {
            Ok(handle) => handle,
            Err(e) => {
                teardown_partial_construction(&inner);
                return Err(PoolError::SpawnFailed(e));
            }
        };
        *inner.dispatcher_handle.lock().unwrap() = Some(handle);

        Ok(Pool { inner })
    }

    /// Submit owned work to the pool. Never blocks.
    pub fn submit(&self, payload: Box<[u8]>) -> Result<(), PoolError> {
        if self.inner.disposed.load(Ordering::Acquire) {
            return Err(PoolError::Rejected);
        }
        self.inner
            .dispatch_queue
            .post(Packet::normal(Some(payload)))
            .map_err(queue_error_to_pool_error)
    }

    /// Submit a payload-less unit of work. Never blocks.
    pub fn submit_empty(&self) -> Result<(), PoolError> {
        if self.inner.disposed.load(Ordering::Acquire) {
            return Err(PoolError::Rejected);
        }
        self.inner
            .dispatch_queue
            .post(Packet::normal(None))
            .map_err(queue_error_to_pool_error)
    }

    pub fn current_threads(&self) -> usize {
        self.inner.current_threads.load(Ordering::Acquire)
    }

    pub fn active_threads(&self) -> usize {
        self.inner.active_threads.load(Ordering::Acquire)
    }

    /// Observational surface for the dispatcher-fault case: once this
    /// returns false, submissions are still accepted onto the dispatch
    /// queue but nothing is draining it.
    pub fn is_healthy(&self) -> bool {
        self.inner.healthy.load(Ordering::Acquire)
    }

    /// The most recent callback panic, translated to `PoolError::CallbackFault`,
    /// if any callback has panicked since construction.
    pub fn last_fault(&self) -> Option<PoolError> {
        self.inner
            .last_fault
            .lock()
            .unwrap()
            .clone()
            .map(PoolError::CallbackFault)
    }

    /// Idempotent, blocking quiesce. Safe to call from any thread,
    /// including from inside a submitted callback — a call from inside a
    /// worker's own callback posts the shutdown sentinels and returns
    /// without waiting for the drain, since this thread can only reach
    /// `current_threads == 0` by first returning from the callback it is
    /// currently inside.
    pub fn shutdown(&self) {
        let in_worker = is_reentrant_on(&self.inner);

        if !self.inner.disposed.swap(true, Ordering::AcqRel) {
            self.inner.dispatch_queue.close();
            post_shutdown_sentinels(&self.inner);
        }

        // A reentrant call from inside a worker's own callback can't block
        // here: this thread can only reach current_threads == 0 by first
        // returning from the callback it is currently inside. Whichever
        // non-reentrant caller comes along next (explicitly, or via Drop)
        // performs the wait and the idempotent queue close.
        if in_worker {
            return;
        }
        wait_for_drain(&self.inner);
        self.inner.worker_queue.close();
    }
}

/// Posts one sentinel, retrying a `Full` queue until it drains enough for
/// the post to succeed (workers keep consuming the backlog ahead of the
/// sentinel throughout) rather than silently dropping it and leaving a
/// worker with no way to exit.
fn post_sentinel_with_retry(inner: &Arc<PoolInner>) {
    use cqpool_core::error::QueueError;

    loop {
        match inner.worker_queue.post(Packet::shutdown()) {
            Ok(()) => break,
            Err(QueueError::Full) => thread::sleep(Duration::from_millis(5)),
            Err(QueueError::Closed) => break,
        }
    }
}

/// Posts one shutdown sentinel per current worker.
fn post_shutdown_sentinels(inner: &Arc<PoolInner>) {
    let current = inner.current_threads.load(Ordering::Acquire);
    for _ in 0..current {
        post_sentinel_with_retry(inner);
    }
}

fn wait_for_drain(inner: &Arc<PoolInner>) {
    while inner.current_threads.load(Ordering::Acquire) > 0 {
        thread::sleep(Duration::from_millis(5));
    }
}

/// Shuts down and joins any workers already spawned by a `Pool::new` call
/// that goes on to fail (a later worker, or the dispatcher, fails to
/// spawn). Without this, the workers already running would leak for the
/// remainder of the process, since no `Pool` value is ever constructed for
/// their `Drop` impl to tear them down.
fn teardown_partial_construction(inner: &Arc<PoolInner>) {
    inner.disposed.store(true, Ordering::Release);
    post_shutdown_sentinels(inner);
    wait_for_drain(inner);
    inner.worker_queue.close();
    inner.dispatch_queue.close();
    let mut handles = inner.worker_handles.lock().unwrap();
    for handle in handles.drain(..) {
        let _ = handle.join();
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.inner.config.name)
            .field("current_threads", &self.current_threads())
            .field("active_threads", &self.active_threads())
            .field("min_threads", &self.inner.config.min_threads)
            .field("max_threads", &self.inner.config.max_threads)
            .field("disposed", &self.inner.disposed.load(Ordering::Acquire))
            .finish()
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.shutdown();

        // If the last `Arc<Pool>` reference is dropped from inside a
        // worker's own callback, this is that worker's own thread running
        // `drop()`. Joining any handle here — including, but not only,
        // this thread's own — would block forever: the thread can't
        // finish until this call returns. `shutdown()` above already
        // detected the reentrant case and skipped its blocking drain, so
        // there's nobody left to hand the join off to; just let the
        // threads finish on their own and drop their handles unjoined.
        if is_reentrant_on(&self.inner) {
            return;
        }

        if let Some(handle) = self.inner.dispatcher_handle.lock().unwrap().take() {
            let _ = handle.join();
        }
        let mut handles = self.inner.worker_handles.lock().unwrap();
        for handle in handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn spawn_worker(inner: &Arc<PoolInner>) -> std::io::Result<()> {
    let id = inner.next_worker_id.fetch_add(1, Ordering::Relaxed);
    let name = format!("{}-worker-{}", inner.config.name, id);
    let worker_inner = Arc::clone(inner);

    // Bump current_threads before the thread starts running: worker_loop
    // decrements it on exit, and a thread that dequeues a pending shutdown
    // sentinel and exits before this count is visible would leave
    // current_threads permanently too high.
    inner.current_threads.fetch_add(1, Ordering::AcqRel);
    let handle = match thread::Builder::new().name(name).spawn(move || worker_loop(worker_inner)) {
        Ok(handle) => handle,
        Err(e) => {
            inner.current_threads.fetch_sub(1, Ordering::AcqRel);
            return Err(e);
        }
    };
    inner.worker_handles.lock().unwrap().push(handle);

    // A shutdown that read current_threads and posted its sentinels
    // concurrently with this spawn would otherwise have no sentinel
    // earmarked for the thread just added; top one up so it always has a
    // way out (or the worker queue is already closed, in which case this
    // thread's first `wait()` returns `Closed` on its own).
    if inner.disposed.load(Ordering::Acquire) {
        post_sentinel_with_retry(inner);
    }
    Ok(())
}

fn run_dispatcher(inner: Arc<PoolInner>) {
    let name = thread::current().name().unwrap_or("dispatcher").to_string();
    crate::log::set_thread_tag(name);
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| dispatcher_loop(&inner)));
    if result.is_err() {
        inner.healthy.store(false, Ordering::Release);
        crate::qerror!("dispatcher thread panicked; pool is now unhealthy");
    }
}

fn dispatcher_loop(inner: &Arc<PoolInner>) {
    let mut last_maint = Instant::now();
    loop {
        if inner.disposed.load(Ordering::Acquire) {
            break;
        }

        let timeout = Duration::from_millis(inner.config.dispatch_timeout_ms);
        match inner.dispatch_queue.wait(timeout) {
            WaitOutcome::Packet(packet, _guard) => {
                if inner.disposed.load(Ordering::Acquire) {
                    break;
                }
                dispatch_one(inner, packet);
                maybe_run_maintenance(inner, &mut last_maint);
            }
            WaitOutcome::Timeout => {
                maybe_run_maintenance(inner, &mut last_maint);
            }
            WaitOutcome::Closed => break,
        }
    }
    crate::qdebug!("dispatcher exiting");
}

/// Reposts `packet` into the worker queue, then blocks until a worker
/// picks it up or the pickup-wait times out. A timeout at max
/// concurrency is the pool's saturation signal and triggers scale-up.
fn dispatch_one(inner: &Arc<PoolInner>, packet: Packet) {
    if inner.worker_queue.post(packet).is_err() {
        crate::qerror!("worker queue rejected packet during dispatch");
        return;
    }

    // Only a packet that was actually posted occupies a FIFO position;
    // allocating this before the post could succeed would burn a
    // position no packet will ever fill, permanently leaving
    // popped_seq one pop short of every target from here on (the
    // dispatcher is the only thread that posts Normal packets or
    // allocates target positions, so sequencing this after a successful
    // post — rather than guarding against concurrent allocation — is
    // what keeps position N always matching the Nth packet popped).
    let target = inner.next_dispatch_seq.fetch_add(1, Ordering::AcqRel) + 1;

    let at_max = inner.current_threads.load(Ordering::Acquire) >= inner.config.max_threads;
    let extra_ms = if at_max { inner.config.max_threads_dispatch_timeout_ms } else { 0 };
    let timeout = Duration::from_millis(inner.config.dispatch_timeout_ms + extra_ms);

    if !inner.dispatch_complete.wait_for_pickup(target, timeout) {
        maybe_scale_up(inner);
    }
}

fn maybe_scale_up(inner: &Arc<PoolInner>) {
    if inner.disposed.load(Ordering::Acquire) {
        return;
    }
    let current = inner.current_threads.load(Ordering::Acquire);
    let active = inner.active_threads.load(Ordering::Acquire);
    if current < inner.config.max_threads && active == current {
        if let Err(e) = spawn_worker(inner) {
            crate::qwarn!("scale-up spawn failed: {}", e);
        } else {
            crate::qinfo!("scaled up to {} threads", inner.current_threads.load(Ordering::Acquire));
        }
    }
}

fn maybe_run_maintenance(inner: &Arc<PoolInner>, last_maint: &mut Instant) {
    if last_maint.elapsed() >= Duration::from_millis(inner.config.maint_period_ms) {
        run_maintenance(inner);
        *last_maint = Instant::now();
    }
}

/// Damped scale-down: posts `floor((idle - max_idle_threads) / 2) + 1`
/// shutdown sentinels once `current_threads > min_threads` and idle
/// exceeds `max_idle_threads`.
fn run_maintenance(inner: &Arc<PoolInner>) {
    let current = inner.current_threads.load(Ordering::Acquire);
    let active = inner.active_threads.load(Ordering::Acquire);
    let idle = current.saturating_sub(active);

    if current > inner.config.min_threads && idle > inner.config.max_idle_threads {
        let above_floor = current - inner.config.min_threads;
        let pending = inner.pending_scale_down.load(Ordering::Acquire);
        let above_floor = above_floor.saturating_sub(pending);
        let n = ((idle - inner.config.max_idle_threads) / 2 + 1).min(above_floor);
        let mut posted = 0;
        for _ in 0..n {
            if inner.worker_queue.post(Packet::shutdown()).is_err() {
                break;
            }
            posted += 1;
        }
        if posted > 0 {
            inner.pending_scale_down.fetch_add(posted, Ordering::AcqRel);
            crate::qinfo!("scale-down: posted {} shutdown sentinels", posted);
        }
    }
}

fn worker_loop(inner: Arc<PoolInner>) {
    let name = thread::current().name().unwrap_or("worker").to_string();
    crate::log::set_thread_tag(name);
    let addr = Arc::as_ptr(&inner) as usize;
    IN_POOL_WORKER.with(|flag| flag.set(Some(addr)));

    // Effectively unbounded: the worker has nothing else to do while
    // idle, so a long bounded wait (re-entered on timeout) stands in
    // for `wait(worker_queue, infinite)`.
    const WORKER_WAIT: Duration = Duration::from_secs(3600);

    loop {
        match inner.worker_queue.wait(WORKER_WAIT) {
            WaitOutcome::Timeout => continue,
            WaitOutcome::Closed => break,
            WaitOutcome::Packet(packet, _guard) => match packet.key {
                Key::Shutdown => {
                    let _ = inner
                        .pending_scale_down
                        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(1)));
                    break;
                }
                Key::Normal => {
                    inner.dispatch_complete.record_pickup();
                    match packet.payload {
                        None => continue,
                        Some(payload) => run_callback(&inner, payload),
                    }
                }
            },
        }
    }

    inner.current_threads.fetch_sub(1, Ordering::AcqRel);
    crate::qdebug!("worker exiting");
}

fn run_callback(inner: &Arc<PoolInner>, payload: Box<[u8]>) {
    inner.active_threads.fetch_add(1, Ordering::AcqRel);
    let callback = &inner.callback;
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| callback(Some(payload))));
    inner.active_threads.fetch_sub(1, Ordering::AcqRel);

    if let Err(panic_payload) = result {
        let message = panic_message(&*panic_payload);
        crate::qwarn!("callback panicked: {}", message);
        *inner.last_fault.lock().unwrap() = Some(message);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn config() -> PoolConfig {
        PoolConfig::new()
            .name("test")
            .min_threads(1)
            .max_threads(4)
            .max_concurrency(4)
            .max_idle_threads(0)
            .dispatch_timeout_ms(50)
            .max_threads_dispatch_timeout_ms(20)
            .maint_period_ms(30)
    }

    #[test]
    fn submit_runs_callback() {
        let (tx, rx) = mpsc::channel();
        let pool = Pool::new(config(), move |payload| {
            tx.send(payload.map(|b| b.to_vec())).unwrap();
        })
        .unwrap();

        pool.submit(vec![1, 2, 3].into_boxed_slice()).unwrap();
        let received = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(received, Some(vec![1, 2, 3]));
    }

    #[test]
    fn submit_empty_does_not_invoke_callback() {
        let (tx, rx) = mpsc::channel::<()>();
        let pool = Pool::new(config(), move |_| {
            tx.send(()).unwrap();
        })
        .unwrap();

        pool.submit_empty().unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn scales_up_under_saturation() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Arc::new(Mutex::new(release_rx));
        let pool = Pool::new(config(), move |_| {
            let _ = release_rx.lock().unwrap().recv();
        })
        .unwrap();

        for _ in 0..4 {
            pool.submit(Box::new([])).unwrap();
        }

        thread::sleep(Duration::from_millis(300));
        assert!(pool.current_threads() > 1, "expected scale-up past min_threads");

        for _ in 0..4 {
            let _ = release_tx.send(());
        }
    }

    #[test]
    fn dropped_repost_does_not_desync_later_pickup_waits() {
        let cfg = config()
            .min_threads(1)
            .max_threads(1)
            .max_concurrency(1)
            .queue_capacity(64)
            .dispatch_timeout_ms(5)
            .max_threads_dispatch_timeout_ms(5);
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Arc::new(Mutex::new(release_rx));
        let (done_tx, done_rx) = mpsc::channel::<u8>();
        let pool = Pool::new(cfg, move |payload| {
            let tag = payload.map(|b| b[0]).unwrap_or(0);
            if tag == 0 {
                // The first submission: block the sole worker so every
                // later repost piles up in worker_queue, which is sized
                // small enough here to overflow and force at least one
                // dropped repost.
                let _ = release_rx.lock().unwrap().recv();
            }
            done_tx.send(tag).unwrap();
        })
        .unwrap();

        pool.submit(Box::new([0])).unwrap();
        for _ in 0..40 {
            let _ = pool.submit(Box::new([1]));
        }

        let _ = release_tx.send(());
        done_rx.recv_timeout(Duration::from_secs(2)).expect("first submission to complete");

        // A fresh submission after the worker frees up must still be
        // picked up promptly: if allocating the dropped repost's FIFO
        // position had desynced popped_seq from next_dispatch_seq, this
        // wait would time out instead.
        pool.submit(Box::new([2])).unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut saw_tag_2 = false;
        while Instant::now() < deadline {
            match done_rx.recv_timeout(Duration::from_millis(100)) {
                Ok(2) => {
                    saw_tag_2 = true;
                    break;
                }
                Ok(_) => continue,
                Err(_) => continue,
            }
        }
        assert!(saw_tag_2, "pickup-wait tracking must recover after a dropped repost");
    }

    #[test]
    fn scales_down_to_min_threads_when_idle() {
        let pool = Pool::new(config(), |_| {}).unwrap();

        for _ in 0..4 {
            pool.submit(Box::new([])).unwrap();
        }
        thread::sleep(Duration::from_millis(300));
        thread::sleep(Duration::from_millis(500));

        assert_eq!(pool.current_threads(), 1);
    }

    #[test]
    fn rejects_submission_after_shutdown() {
        let pool = Pool::new(config(), |_| {}).unwrap();
        pool.shutdown();
        match pool.submit_empty() {
            Err(PoolError::Rejected) => {}
            _ => panic!("expected rejection after shutdown"),
        }
        assert_eq!(pool.current_threads(), 0);
    }

    #[test]
    fn full_dispatch_queue_reports_queue_full_not_rejected() {
        let cfg = config()
            .queue_capacity(1)
            .min_threads(1)
            .max_threads(1)
            .max_concurrency(1)
            .dispatch_timeout_ms(5_000);
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Arc::new(Mutex::new(release_rx));
        let pool = Pool::new(cfg, move |_| {
            let _ = release_rx.lock().unwrap().recv();
        })
        .unwrap();

        // The sole worker is pinned in its callback after the first
        // submission, so the dispatcher blocks mid-dispatch on the next
        // one (long dispatch_timeout_ms keeps it from giving up and
        // looping back to drain the queue); flooding submissions past
        // the single-slot dispatch queue's capacity must eventually hit
        // Full rather than silently succeeding or reporting Rejected.
        let mut saw_queue_full = false;
        for _ in 0..64 {
            match pool.submit(Box::new([])) {
                Ok(()) => {}
                Err(PoolError::QueueFull) => {
                    saw_queue_full = true;
                    break;
                }
                other => panic!("expected Ok or QueueFull, got {:?}", other),
            }
        }
        assert!(saw_queue_full, "expected a full dispatch queue to surface QueueFull");

        for _ in 0..64 {
            let _ = release_tx.send(());
        }
        pool.shutdown();
    }

    #[test]
    fn shutdown_is_idempotent() {
        let pool = Pool::new(config(), |_| {}).unwrap();
        pool.shutdown();
        pool.shutdown();
        assert_eq!(pool.current_threads(), 0);
    }

    #[test]
    fn callback_panic_is_contained() {
        let (tx, rx) = mpsc::channel();
        let pool = Pool::new(config(), move |_| {
            tx.send(()).unwrap();
            panic!("boom");
        })
        .unwrap();

        pool.submit(Box::new([])).unwrap();
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        thread::sleep(Duration::from_millis(100));

        // The worker survives the panic and the pool stays healthy.
        assert!(pool.is_healthy());
        assert!(pool.current_threads() >= 1);
        match pool.last_fault() {
            Some(PoolError::CallbackFault(msg)) => assert_eq!(msg, "boom"),
            other => panic!("expected CallbackFault, got {:?}", other),
        }
    }

    #[test]
    fn scale_down_never_drops_below_min_threads() {
        let cfg = config().min_threads(1).max_idle_threads(0);
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Arc::new(Mutex::new(release_rx));
        let pool = Pool::new(cfg, move |_| {
            let _ = release_rx.lock().unwrap().recv();
        })
        .unwrap();

        for _ in 0..4 {
            pool.submit(Box::new([])).unwrap();
        }
        thread::sleep(Duration::from_millis(300));
        assert!(pool.current_threads() > 1, "expected scale-up past min_threads");

        for _ in 0..4 {
            let _ = release_tx.send(());
        }

        thread::sleep(Duration::from_millis(500));
        assert_eq!(pool.current_threads(), 1, "must not drop below min_threads");
    }

    #[test]
    fn respects_min_threads_floor() {
        let cfg = config().min_threads(2).max_idle_threads(5);
        let pool = Pool::new(cfg, |_| {}).unwrap();
        thread::sleep(Duration::from_millis(200));
        assert_eq!(pool.current_threads(), 2);
    }

    #[test]
    fn shutdown_from_inside_callback_does_not_deadlock() {
        let slot: Arc<Mutex<Option<Arc<Pool>>>> = Arc::new(Mutex::new(None));
        let slot_cb = Arc::clone(&slot);
        let (tx, rx) = mpsc::channel::<()>();

        let pool = Arc::new(
            Pool::new(config(), move |_| {
                let pool = slot_cb.lock().unwrap().clone().unwrap();
                pool.shutdown();
                tx.send(()).unwrap();
            })
            .unwrap(),
        );
        *slot.lock().unwrap() = Some(Arc::clone(&pool));

        pool.submit(vec![].into_boxed_slice()).unwrap();
        rx.recv_timeout(Duration::from_secs(2))
            .expect("callback-triggered shutdown must not deadlock");

        // A subsequent external call finishes draining and closing.
        pool.shutdown();
        assert_eq!(pool.current_threads(), 0);
    }

    #[test]
    fn drop_of_last_arc_from_inside_callback_does_not_deadlock() {
        let slot: Arc<Mutex<Option<Arc<Pool>>>> = Arc::new(Mutex::new(None));
        let slot_cb = Arc::clone(&slot);
        let (tx, rx) = mpsc::channel::<()>();

        let pool = Arc::new(
            Pool::new(config(), move |_| {
                // Taking this callback's own clone out of the slot and
                // letting it drop at the end of the closure makes this
                // worker thread the one that runs `Pool::drop`, since no
                // other `Arc<Pool>` reference survives past this point.
                let pool = slot_cb.lock().unwrap().take().unwrap();
                drop(pool);
                tx.send(()).unwrap();
            })
            .unwrap(),
        );
        *slot.lock().unwrap() = Some(Arc::clone(&pool));
        pool.submit(vec![].into_boxed_slice()).unwrap();
        drop(pool);

        rx.recv_timeout(Duration::from_secs(2))
            .expect("dropping the last Arc<Pool> from inside its own callback must not deadlock");
    }
}
