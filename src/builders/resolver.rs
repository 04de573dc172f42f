//! Parameter resolution: raw add request → validated pool record.
//!
//! Pure: resolution builds the record or fails, and never touches the
//! service container.

use std::time::Duration;

use crate::config::attributes::{
    AttributeDefinition, HANDOFF_EXECUTOR, KEEPALIVE_TIME, MAX_THREADS, THREAD_FACTORY,
};
use crate::config::record::{AddRequest, PoolRecord};
use crate::core::error::ValidationError;

/// Keep-alive applied when the raw request leaves `keepalive-time` unset.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_millis(30_000);

/// Attribute set for blocking pools.
pub const BLOCKING_ATTRIBUTES: &[AttributeDefinition] =
    &[KEEPALIVE_TIME, MAX_THREADS, THREAD_FACTORY];

/// Attribute set for non-blocking pools: the blocking set plus the
/// hand-off-executor reference.
pub const NON_BLOCKING_ATTRIBUTES: &[AttributeDefinition] =
    &[KEEPALIVE_TIME, MAX_THREADS, THREAD_FACTORY, HANDOFF_EXECUTOR];

/// The attribute set validated for the given operating mode.
#[must_use]
pub const fn attribute_set(blocking: bool) -> &'static [AttributeDefinition] {
    if blocking {
        BLOCKING_ATTRIBUTES
    } else {
        NON_BLOCKING_ATTRIBUTES
    }
}

/// Resolve a raw add request into a validated [`PoolRecord`].
///
/// The attribute set is selected by `blocking` before any field is read, so
/// a blocking record can never carry a hand-off-executor reference: the
/// attribute is rejected as unknown. The pool name comes from the request
/// address, never from the payload.
///
/// # Errors
///
/// The first failing field yields a [`ValidationError`] naming the field
/// and the violated constraint; no partial record is returned.
pub fn resolve(request: &AddRequest, blocking: bool) -> Result<PoolRecord, ValidationError> {
    let name = request.pool_name()?.to_owned();
    let attributes = attribute_set(blocking);

    for key in request.attributes.keys() {
        if !attributes.iter().any(|attr| attr.name() == key) {
            return Err(ValidationError::UnknownAttribute(key.clone()));
        }
    }

    let keep_alive = KEEPALIVE_TIME
        .read_millis(request)?
        .unwrap_or(DEFAULT_KEEP_ALIVE);
    let max_threads = MAX_THREADS
        .read_count(request)?
        .ok_or(ValidationError::MissingAttribute(MAX_THREADS.name()))?;
    let thread_factory = THREAD_FACTORY.read_reference(request)?;
    let handoff_executor = if blocking {
        None
    } else {
        HANDOFF_EXECUTOR.read_reference(request)?
    };

    Ok(PoolRecord {
        name,
        max_threads,
        keep_alive,
        blocking,
        thread_factory,
        handoff_executor,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    fn request(name: &str, attrs: Value) -> AddRequest {
        let Value::Object(map) = attrs else {
            panic!("attrs must be a JSON object")
        };
        AddRequest::new(vec!["worker-pools".into(), name.into()], map)
    }

    #[test]
    fn attribute_sets_differ_only_in_the_handoff_slot() {
        let blocking: Vec<_> = BLOCKING_ATTRIBUTES.iter().map(|a| a.name()).collect();
        let non_blocking: Vec<_> = NON_BLOCKING_ATTRIBUTES.iter().map(|a| a.name()).collect();
        assert_eq!(non_blocking[..blocking.len()], blocking[..]);
        assert_eq!(non_blocking.last(), Some(&"handoff-executor"));
    }

    #[test]
    fn blocking_record_matches_its_attribute_set() {
        let record = resolve(
            &request(
                "ingest",
                json!({"max-threads": 4, "keepalive-time": 100, "thread-factory": "tf"}),
            ),
            true,
        )
        .expect("valid blocking request");
        assert_eq!(record.name, "ingest");
        assert!(record.blocking);
        assert_eq!(record.max_threads, 4);
        assert_eq!(record.keep_alive, Duration::from_millis(100));
        assert_eq!(record.thread_factory.as_deref(), Some("tf"));
        assert_eq!(record.handoff_executor, None);
    }

    #[test]
    fn blocking_mode_rejects_the_handoff_attribute() {
        let err = resolve(
            &request("p", json!({"max-threads": 1, "handoff-executor": "overflow"})),
            true,
        )
        .expect_err("hand-off is not in the blocking set");
        assert_eq!(
            err,
            ValidationError::UnknownAttribute("handoff-executor".into())
        );
    }

    #[test]
    fn non_blocking_record_carries_the_handoff_reference() {
        let record = resolve(
            &request("p", json!({"max-threads": 2, "handoff-executor": "overflow"})),
            false,
        )
        .expect("valid non-blocking request");
        assert!(!record.blocking);
        assert_eq!(record.handoff_executor.as_deref(), Some("overflow"));
    }

    #[test]
    fn non_blocking_handoff_slot_may_stay_unset() {
        let record = resolve(&request("p", json!({"max-threads": 2})), false)
            .expect("hand-off is optional");
        assert_eq!(record.handoff_executor, None);
    }

    #[test]
    fn missing_max_threads_fails_fast() {
        let err = resolve(&request("p", json!({})), true).expect_err("max-threads is required");
        assert_eq!(err, ValidationError::MissingAttribute("max-threads"));
    }

    #[test]
    fn keep_alive_defaults_when_unset() {
        let record = resolve(&request("p", json!({"max-threads": 1})), true).expect("valid");
        assert_eq!(record.keep_alive, DEFAULT_KEEP_ALIVE);
    }

    #[test]
    fn unknown_attributes_are_rejected_in_either_mode() {
        let err = resolve(
            &request("p", json!({"max-threads": 1, "queue-length": 10})),
            false,
        )
        .expect_err("queueless pools have no queue-length");
        assert_eq!(err, ValidationError::UnknownAttribute("queue-length".into()));
    }
}
