//! Attribute definitions and the type/range validation primitives behind
//! them.
//!
//! Each pool attribute is described once, as data; resolution walks the
//! attribute set selected by the operating mode and validates field by
//! field through [`AttributeDefinition::validate_and_read`]. The first
//! failure names the field and the violated constraint.

use std::time::Duration;

use serde_json::Value;

use crate::config::record::AddRequest;
use crate::core::error::ValidationError;

/// Value shape an attribute must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrKind {
    /// Unsigned integer, strictly positive.
    PositiveInt,
    /// Unsigned integer of milliseconds, zero allowed.
    Millis,
    /// Non-empty string naming another service.
    Reference,
}

/// Declarative description of one configuration attribute.
#[derive(Debug, Clone, Copy)]
pub struct AttributeDefinition {
    name: &'static str,
    required: bool,
    kind: AttrKind,
}

/// `max-threads`: the pool's worker bound.
pub const MAX_THREADS: AttributeDefinition = AttributeDefinition {
    name: "max-threads",
    required: true,
    kind: AttrKind::PositiveInt,
};

/// `keepalive-time`: idle-worker expiry in milliseconds.
pub const KEEPALIVE_TIME: AttributeDefinition = AttributeDefinition {
    name: "keepalive-time",
    required: false,
    kind: AttrKind::Millis,
};

/// `thread-factory`: reference to a named thread-factory service.
pub const THREAD_FACTORY: AttributeDefinition = AttributeDefinition {
    name: "thread-factory",
    required: false,
    kind: AttrKind::Reference,
};

/// `handoff-executor`: reference to a named overflow service; only part of
/// the non-blocking attribute set.
pub const HANDOFF_EXECUTOR: AttributeDefinition = AttributeDefinition {
    name: "handoff-executor",
    required: false,
    kind: AttrKind::Reference,
};

impl AttributeDefinition {
    /// The attribute's name in the raw request.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Validate this attribute against `request` and return its raw value.
    ///
    /// # Errors
    ///
    /// [`ValidationError::MissingAttribute`] for an absent required field,
    /// [`ValidationError::WrongType`] / [`ValidationError::OutOfRange`] for
    /// a present field violating its rule.
    pub fn validate_and_read(&self, request: &AddRequest) -> Result<Option<Value>, ValidationError> {
        match request.attributes.get(self.name) {
            None if self.required => Err(ValidationError::MissingAttribute(self.name)),
            None => Ok(None),
            Some(value) => {
                self.check(value)?;
                Ok(Some(value.clone()))
            }
        }
    }

    /// Read the attribute as a count (`PositiveInt`).
    ///
    /// # Errors
    ///
    /// See [`AttributeDefinition::validate_and_read`].
    pub fn read_count(&self, request: &AddRequest) -> Result<Option<usize>, ValidationError> {
        let Some(value) = self.validate_and_read(request)? else {
            return Ok(None);
        };
        let n = value.as_u64().ok_or(ValidationError::WrongType {
            field: self.name,
            expected: "a positive integer",
        })?;
        usize::try_from(n)
            .map(Some)
            .map_err(|_| ValidationError::OutOfRange {
                field: self.name,
                constraint: "does not fit the platform's word size",
            })
    }

    /// Read the attribute as a millisecond duration (`Millis`).
    ///
    /// # Errors
    ///
    /// See [`AttributeDefinition::validate_and_read`].
    pub fn read_millis(&self, request: &AddRequest) -> Result<Option<Duration>, ValidationError> {
        let Some(value) = self.validate_and_read(request)? else {
            return Ok(None);
        };
        let ms = value.as_u64().ok_or(ValidationError::WrongType {
            field: self.name,
            expected: "a non-negative integer of milliseconds",
        })?;
        Ok(Some(Duration::from_millis(ms)))
    }

    /// Read the attribute as a service reference (`Reference`).
    ///
    /// # Errors
    ///
    /// See [`AttributeDefinition::validate_and_read`].
    pub fn read_reference(&self, request: &AddRequest) -> Result<Option<String>, ValidationError> {
        let Some(value) = self.validate_and_read(request)? else {
            return Ok(None);
        };
        match value.as_str() {
            Some(s) => Ok(Some(s.to_owned())),
            None => Err(ValidationError::WrongType {
                field: self.name,
                expected: "a service name string",
            }),
        }
    }

    fn check(&self, value: &Value) -> Result<(), ValidationError> {
        match self.kind {
            AttrKind::PositiveInt => match value.as_u64() {
                Some(0) => Err(ValidationError::OutOfRange {
                    field: self.name,
                    constraint: "must be greater than zero",
                }),
                Some(_) => Ok(()),
                None => Err(ValidationError::WrongType {
                    field: self.name,
                    expected: "a positive integer",
                }),
            },
            AttrKind::Millis => value.as_u64().map(drop).ok_or(ValidationError::WrongType {
                field: self.name,
                expected: "a non-negative integer of milliseconds",
            }),
            AttrKind::Reference => match value.as_str() {
                Some("") => Err(ValidationError::OutOfRange {
                    field: self.name,
                    constraint: "must not be empty",
                }),
                Some(_) => Ok(()),
                None => Err(ValidationError::WrongType {
                    field: self.name,
                    expected: "a service name string",
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map};

    use super::*;

    fn request(attrs: Value) -> AddRequest {
        let Value::Object(map) = attrs else {
            panic!("attrs must be a JSON object")
        };
        AddRequest::new(vec!["pools".into(), "p".into()], map)
    }

    #[test]
    fn required_attribute_must_be_present() {
        let req = AddRequest::new(vec!["p".into()], Map::new());
        assert_eq!(
            MAX_THREADS.validate_and_read(&req),
            Err(ValidationError::MissingAttribute("max-threads"))
        );
    }

    #[test]
    fn optional_attribute_may_be_absent() {
        let req = AddRequest::new(vec!["p".into()], Map::new());
        assert_eq!(KEEPALIVE_TIME.read_millis(&req), Ok(None));
        assert_eq!(THREAD_FACTORY.read_reference(&req), Ok(None));
    }

    #[test]
    fn zero_max_threads_is_out_of_range() {
        let req = request(json!({"max-threads": 0}));
        assert!(matches!(
            MAX_THREADS.read_count(&req),
            Err(ValidationError::OutOfRange {
                field: "max-threads",
                ..
            })
        ));
    }

    #[test]
    fn wrong_json_type_is_named() {
        let req = request(json!({"max-threads": "four"}));
        assert_eq!(
            MAX_THREADS.read_count(&req),
            Err(ValidationError::WrongType {
                field: "max-threads",
                expected: "a positive integer",
            })
        );
    }

    #[test]
    fn keepalive_zero_is_allowed() {
        let req = request(json!({"keepalive-time": 0}));
        assert_eq!(
            KEEPALIVE_TIME.read_millis(&req),
            Ok(Some(Duration::ZERO))
        );
    }

    #[test]
    fn empty_reference_is_rejected() {
        let req = request(json!({"thread-factory": ""}));
        assert!(matches!(
            THREAD_FACTORY.read_reference(&req),
            Err(ValidationError::OutOfRange {
                field: "thread-factory",
                ..
            })
        ));
    }
}
