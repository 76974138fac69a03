//! # cqpool-core — trait definitions for cqpool
//!
//! This crate defines the trait boundary between the pool's algorithm
//! (dispatcher loop, worker loop, elasticity controller) and the kernel
//! primitive it schedules on top of. Every component in `cqpool-backend`
//! depends on traits from this crate, never on a concrete queue type.
//!
//! ## Design principle
//!
//! > Program to the interface. The default `CompletionQueue` impl models
//! > a single process's in-memory view of an OS completion port; a future
//! > impl could wrap a real IOCP handle or an io_uring-backed ring without
//! > touching the dispatcher or worker loops.

pub mod entry;
pub mod queue;
pub mod error;
