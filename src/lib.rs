//! # Queueless Pool
//!
//! Declaratively provisioned, bounded worker pools with **no task queue**.
//!
//! A queueless pool hands every task directly to a worker thread: either an
//! idle worker takes it on the spot, or a new worker is created up to the
//! pool's bound. When the pool is saturated the admission policy decides
//! what happens: the submitting thread blocks until a worker frees up, or
//! the task is delegated to an overflow ("hand-off") executor, or the
//! submission is rejected outright. There is no intermediate buffering at
//! any point.
//!
//! ## Core Problem Solved
//!
//! Managed runtimes that host many independent services need thread pools
//! that are *provisioned*, not hand-built:
//!
//! - **Declarative configuration**: a pool is described by a validated
//!   record (name, bound, keep-alive, admission policy), not by code
//! - **Dependency wiring**: the thread factory and overflow executor are
//!   named services resolved by a container before the pool starts
//! - **All-or-nothing installs**: a failed provision rolls back every
//!   service it created, leaving nothing half-registered
//! - **Bounded concurrency without queues**: callers get immediate,
//!   distinguishable outcomes instead of unbounded buffering
//!
//! ## Provisioning a pool
//!
//! ```rust,ignore
//! use queueless_pool::builders::pipeline::add_nonblocking_pool;
//! use queueless_pool::config::AddRequest;
//! use queueless_pool::runtime::ServiceContainer;
//!
//! let container = ServiceContainer::new();
//! let request = AddRequest::from_json_str(
//!     r#"{
//!         "address": ["worker-pools", "ingest"],
//!         "attributes": {
//!             "max-threads": 4,
//!             "keepalive-time": 5000,
//!             "handoff-executor": "overflow"
//!         }
//!     }"#,
//! )?;
//!
//! let handle = add_nonblocking_pool(&container, &request)?;
//! let pool = container.pool(handle.name()).expect("pool is up");
//! pool.submit(|| do_work())?;
//! ```
//!
//! ## Submitting work
//!
//! [`core::QueuelessPool::submit`] reports exactly how the task was
//! admitted: handed to an idle worker, run on a freshly created worker,
//! accepted after a blocking wait, or delegated to the overflow executor.
//! Saturation and shutdown surface as typed errors, never as silent drops.
//!
//! For complete examples, see:
//! - `tests/pool_test.rs` - admission semantics under concurrent load
//! - `tests/provision_test.rs` - the two-phase provisioning pipeline

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core pool runtime, capability seams, and error taxonomy.
pub mod core;
/// Configuration models: add requests, attribute validation, pool records.
pub mod config;
/// Builders turning validated records into running, dependency-wired pools.
pub mod builders;
/// Runtime service container: named registration, injection, verification.
pub mod runtime;
/// Shared utilities.
pub mod util;
