//! Error types for the record model.
//!
//! A nested-record type mismatch is deliberately absent from this list:
//! assigning a record of the wrong type to a nested field produces an empty
//! field, not an error.

use thiserror::Error;

/// Errors raised by record access, value processing and distance arithmetic.
#[derive(Debug, Error)]
pub enum RecordError {
    /// A keypath segment or record type name does not exist in the schema.
    #[error("no field `{path}` on record type `{record_type}`")]
    NotFound { record_type: String, path: String },

    /// An operation that has no meaning for its operands.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A raw value could not be converted to the field's scalar kind.
    #[error("invalid value for field `{field}`: {reason}")]
    InvalidValue { field: String, reason: String },

    /// An updatable pattern could not be compiled.
    #[error("invalid pattern for field `{field}`: {source}")]
    Pattern {
        field: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors raised while building a [`Registry`](crate::Registry).
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A record type was declared but never given a definition.
    #[error("record type `{0}` was declared but never defined")]
    Undefined(String),

    /// A record type was defined twice.
    #[error("record type `{0}` is defined more than once")]
    Duplicate(String),

    /// A field refers to a record type id handed out by another registry.
    #[error("field `{field}` of `{record_type}` refers to a type from another registry")]
    ForeignType { record_type: String, field: String },

    /// An identity declaration names a field that is missing or not a set of scalars.
    #[error("identity field `{field}` of `{record_type}` must be a set of scalars")]
    IdentityField { record_type: String, field: String },

    /// A base pattern is not a valid regular expression.
    #[error("invalid pattern for `{record_type}.{field}`: {source}")]
    Pattern {
        record_type: String,
        field: String,
        #[source]
        source: regex::Error,
    },
}

/// Result type for record operations.
pub type RecordResult<T> = Result<T, RecordError>;
