//! Configuration models: add requests, attribute validation, pool records.

pub mod attributes;
pub mod record;

pub use attributes::{
    AttributeDefinition, HANDOFF_EXECUTOR, KEEPALIVE_TIME, MAX_THREADS, THREAD_FACTORY,
};
pub use record::{AddRequest, PoolRecord};
