//! Error types for provisioning and pool runtime operations.
//!
//! The taxonomy is layered the way failures actually occur: phase-1
//! resolution failures ([`ValidationError`]) have no runtime effect,
//! phase-2 wiring failures ([`BindError`]) trigger container rollback, and
//! runtime submission failures ([`PoolError`]) are per-call and never stop
//! the pool.

use std::time::Duration;

use thiserror::Error;

/// Phase-1 failures: a raw add request did not resolve to a valid record.
///
/// No partial record is ever produced and no runtime state is touched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required attribute was absent from the request.
    #[error("required attribute `{0}` is missing")]
    MissingAttribute(&'static str),
    /// An attribute was present but carried the wrong JSON type.
    #[error("attribute `{field}` must be {expected}")]
    WrongType {
        /// Attribute name.
        field: &'static str,
        /// Human-readable expected type, e.g. "a positive integer".
        expected: &'static str,
    },
    /// An attribute value violated its range constraint.
    #[error("attribute `{field}` is out of range: {constraint}")]
    OutOfRange {
        /// Attribute name.
        field: &'static str,
        /// The constraint that was violated.
        constraint: &'static str,
    },
    /// An attribute is not part of the selected operating mode's set.
    #[error("attribute `{0}` is not allowed for this pool mode")]
    UnknownAttribute(String),
    /// The request address carried no path elements to name the pool from.
    #[error("request address is empty, cannot derive a pool name")]
    EmptyAddress,
}

/// Phase-2 failures: the service graph could not be wired or started.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BindError {
    /// A declared dependency is not registered in the container.
    #[error("service `{service}` depends on `{dependency}`, which is not registered")]
    MissingDependency {
        /// The dependent service.
        service: String,
        /// The missing dependency name.
        dependency: String,
    },
    /// A declared dependency exists but failed to start.
    #[error("dependency `{dependency}` of service `{service}` failed to start")]
    DependencyFailed {
        /// The dependent service.
        service: String,
        /// The dependency that failed.
        dependency: String,
    },
    /// A dependency started but exposes no capability the service can use.
    #[error("dependency `{dependency}` does not expose a capability usable by `{service}`")]
    UnusableDependency {
        /// The dependent service.
        service: String,
        /// The unusable dependency name.
        dependency: String,
    },
    /// The container attempted to inject the same dependency twice.
    #[error("dependency `{dependency}` was already injected into `{service}`")]
    AlreadyInjected {
        /// The dependent service.
        service: String,
        /// The doubly-injected dependency name.
        dependency: String,
    },
    /// The service does not accept injected dependencies at all.
    #[error("service `{0}` does not accept injected dependencies")]
    NoInjectionPoint(String),
    /// A pool reached its start transition without a bound thread factory.
    #[error("no thread factory was bound to pool `{0}` before start")]
    MissingThreadFactory(String),
    /// Start was requested for a service that already left the down state.
    #[error("service `{0}` has already been started")]
    AlreadyStarted(String),
}

/// Umbrella error for the add/provisioning pipeline and container surface.
///
/// Phase-1 and phase-2 failures abort the operation all-or-nothing: every
/// service the failed operation created is rolled back before the error is
/// returned.
#[derive(Debug, Error)]
pub enum OperationError {
    /// Phase 1 rejected the raw request.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    /// The target name is already registered; checked before phase 2.
    #[error("a service named `{0}` is already registered")]
    DuplicateName(String),
    /// A container operation referenced a name that is not registered.
    #[error("no service named `{0}` is registered")]
    UnknownService(String),
    /// Phase 2 failed while wiring or starting the service graph.
    #[error(transparent)]
    Bind(#[from] BindError),
    /// The service did not reach the up state within the policy window.
    #[error("service `{service}` did not come up within {deadline:?}")]
    VerifyTimeout {
        /// The service being verified.
        service: String,
        /// The verification deadline that elapsed.
        deadline: Duration,
    },
}

/// A hand-off executor declined to take responsibility for a task.
///
/// The rejected task is dropped; the policy behind the rejection belongs to
/// the executor, not to the pool that delegated.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("hand-off executor rejected the task")]
pub struct HandoffRejected;

/// Runtime submission failures. Per-call: the pool keeps operating.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Saturated non-blocking pool with no hand-off executor bound.
    #[error("pool `{0}` is saturated and has no hand-off executor")]
    Saturated(String),
    /// The pool is not in the up state.
    #[error("pool `{0}` is not accepting tasks")]
    Unavailable(String),
    /// A blocked submitter was released because the pool began stopping.
    #[error("pool `{0}` is stopping")]
    Stopping(String),
    /// The hand-off executor took the task and rejected it.
    #[error(transparent)]
    HandoffRejected(#[from] HandoffRejected),
    /// The thread factory failed to produce a worker thread.
    #[error("failed to spawn a worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_names_the_field() {
        let err = ValidationError::OutOfRange {
            field: "max-threads",
            constraint: "must be greater than zero",
        };
        assert_eq!(
            err.to_string(),
            "attribute `max-threads` is out of range: must be greater than zero"
        );
    }

    #[test]
    fn operation_error_wraps_validation() {
        let err = OperationError::from(ValidationError::MissingAttribute("max-threads"));
        assert!(matches!(err, OperationError::Validation(_)));
        assert!(err.to_string().contains("max-threads"));
    }

    #[test]
    fn pool_error_display() {
        assert_eq!(
            PoolError::Saturated("ingest".into()).to_string(),
            "pool `ingest` is saturated and has no hand-off executor"
        );
        assert_eq!(
            PoolError::Stopping("ingest".into()).to_string(),
            "pool `ingest` is stopping"
        );
        assert_eq!(
            PoolError::HandoffRejected(HandoffRejected).to_string(),
            "hand-off executor rejected the task"
        );
    }
}
