//! # cqpool - completion-queue-gated elastic thread pool
//!
//! A per-instance, user-space thread pool whose scheduling substrate is a
//! bounded-concurrency FIFO completion queue, modeled after an OS
//! completion port (Windows IOCP and similar). Submit opaque work;
//! `cqpool` dispatches it to worker threads and scales the worker count
//! between `min_threads` and `max_threads` under load.
//!
//! ## Quick Start
//!
//! ```ignore
//! use cqpool::{Pool, PoolConfig};
//!
//! let pool = Pool::new(
//!     PoolConfig::new().min_threads(2).max_threads(16).max_concurrency(8),
//!     |payload| {
//!         if let Some(bytes) = payload {
//!             println!("got {} bytes", bytes.len());
//!         }
//!     },
//! ).expect("pool construction");
//!
//! pool.submit(vec![1, 2, 3].into_boxed_slice()).unwrap();
//! pool.shutdown();
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         submit()/submit_empty()               │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//!                    ┌─────────────────────┐
//!                    │   dispatch queue     │  concurrency = 1
//!                    └─────────────────────┘
//!                               │
//!                               ▼
//!                     ┌───────────────────┐
//!                     │     dispatcher     │  reposts, pickup-waits,
//!                     └───────────────────┘  drives elasticity
//!                               │
//!                               ▼
//!                    ┌─────────────────────┐
//!                    │    worker queue      │  concurrency = max_concurrency
//!                    └─────────────────────┘
//!                       │      │      │
//!                       ▼      ▼      ▼
//!                  worker  worker  worker   ← spawned/retired by elasticity
//! ```

pub use cqpool_backend::config::{PoolConfig, PoolConfigBuilder};
pub use cqpool_backend::error::{PoolError, Result};
pub use cqpool_backend::gated_queue::GatedQueue;
pub use cqpool_backend::pool::Pool;
pub use cqpool_backend::{qdebug, qerror, qinfo, qtrace, qwarn};
pub use cqpool_backend::log::{init as init_logging, set_log_level, LogLevel};

pub use cqpool_core::entry::{Key, Packet};
pub use cqpool_core::queue::{CompletionQueue, GateGuard, WaitOutcome};
