//! Core pool runtime, capability seams, and error taxonomy.

pub mod error;
pub mod factory;
pub mod handoff;
pub mod pool;

pub use error::{
    AppResult, BindError, HandoffRejected, OperationError, PoolError, ValidationError,
};
pub use factory::{NamedThreadFactory, ThreadFactory};
pub use handoff::{CallerRunsExecutor, HandoffExecutor, Task};
pub use pool::{Admission, AdmissionPolicy, PoolState, PoolStats, QueuelessPool};
