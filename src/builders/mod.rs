//! Builders turning validated records into running, dependency-wired pools.

pub mod binder;
pub mod pipeline;
pub mod resolver;

pub use pipeline::{add_blocking_pool, add_nonblocking_pool, add_queueless_pool};
