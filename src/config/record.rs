//! Add-request model and the validated pool record.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::error::ValidationError;

/// A raw add request: a structural address naming where the pool lives in
/// the configuration tree, plus the unvalidated attribute payload.
///
/// The pool's instance name comes from the address, never from the
/// attributes, which guarantees name/address consistency across the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddRequest {
    /// Path elements addressing the pool; the last element is the name.
    pub address: Vec<String>,
    /// Raw attribute values, keyed by attribute name.
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl AddRequest {
    /// Build a request from an address path and attribute map.
    #[must_use]
    pub const fn new(address: Vec<String>, attributes: Map<String, Value>) -> Self {
        Self {
            address,
            attributes,
        }
    }

    /// Parse a request from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns the parse error message; attribute-level validation happens
    /// later, at resolution.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))
    }

    /// The pool name addressed by this request (the last path element).
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyAddress`] when the address carries no
    /// path elements.
    pub fn pool_name(&self) -> Result<&str, ValidationError> {
        self.address
            .last()
            .map(String::as_str)
            .filter(|name| !name.is_empty())
            .ok_or(ValidationError::EmptyAddress)
    }
}

/// Immutable, validated description of one pool instance.
///
/// Produced by resolution exactly once per add request; never mutated
/// afterwards. The `blocking` flag selects which attribute set was used for
/// validation: `handoff_executor` only exists on non-blocking records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRecord {
    /// Unique name within the pool namespace, derived from the address.
    pub name: String,
    /// Upper bound on live worker threads; strictly positive.
    pub max_threads: usize,
    /// Idle time after which a worker retires.
    pub keep_alive: Duration,
    /// Admission policy selector, fixed at construction.
    pub blocking: bool,
    /// Reference to a named thread-factory service, when configured.
    pub thread_factory: Option<String>,
    /// Reference to a named hand-off-executor service; only ever set on
    /// non-blocking records.
    pub handoff_executor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_comes_from_the_address() {
        let req = AddRequest::from_json_str(
            r#"{"address": ["worker-pools", "ingest"], "attributes": {"max-threads": 2}}"#,
        )
        .expect("valid json");
        assert_eq!(req.pool_name().unwrap(), "ingest");
    }

    #[test]
    fn empty_address_has_no_name() {
        let req = AddRequest::new(Vec::new(), Map::new());
        assert_eq!(req.pool_name(), Err(ValidationError::EmptyAddress));
    }

    #[test]
    fn attributes_default_to_empty() {
        let req = AddRequest::from_json_str(r#"{"address": ["p"]}"#).expect("valid json");
        assert!(req.attributes.is_empty());
    }

    #[test]
    fn record_round_trips_through_json() {
        let record = PoolRecord {
            name: "ingest".into(),
            max_threads: 4,
            keep_alive: Duration::from_millis(5000),
            blocking: false,
            thread_factory: Some("tf".into()),
            handoff_executor: None,
        };
        let json = serde_json::to_string(&record).expect("serialize");
        let back: PoolRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, record);
    }
}
