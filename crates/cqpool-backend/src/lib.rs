//! # cqpool-backend
//!
//! Default `CompletionQueue` backend plus the pool algorithm (dispatcher,
//! worker, elasticity, shutdown) built on top of it, and the ambient stack
//! (config, logging, errors, env) every concrete instance needs.
//!
//! ## Modules
//!
//! - `gated_queue` - default `CompletionQueue` implementation
//! - `pool` - `Pool`, the dispatcher/worker/elasticity/shutdown pipeline
//! - `config` - `PoolConfig` builder
//! - `error` - `PoolError`
//! - `log` - leveled, context-tagged logging macros
//! - `env` - environment variable utilities

pub mod config;
pub mod env;
pub mod error;
pub mod gated_queue;
pub mod log;
pub mod pool;

pub use config::{PoolConfig, PoolConfigBuilder};
pub use error::{PoolError, Result};
pub use gated_queue::GatedQueue;
pub use pool::Pool;
