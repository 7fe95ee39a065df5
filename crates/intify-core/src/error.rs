//! Error types for the record engine.
//!
//! Coordinate and predicate failures are local to a single record and are
//! returned as values so batch operations keep going. `FilterError` marks a
//! misconfigured filter and is meant to be surfaced to the caller.

use thiserror::Error;

/// A grid reference that neither coordinate dialect recognizes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinateError {
    #[error("grid reference is empty")]
    Empty,
    #[error("unrecognized grid reference: {0:?}")]
    Unrecognized(String),
    #[error("coordinate out of range (lon {lon}, lat {lat})")]
    OutOfRange { lon: f64, lat: f64 },
}

/// Filter configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// A reserved date field was given value-set semantics.
    #[error("field `{field}` takes a single date bound, got {count} values")]
    ValueSetOnDateField { field: String, count: usize },
    /// A date bound was requested for an ordinary attribute field.
    #[error("field `{field}` is not a date bound field")]
    DateBoundOnValueField { field: String },
    /// A chosen value is not among the suggestions for its field.
    #[error("`{value}` is not a known value for field `{field}`")]
    UnknownChoice { field: String, value: String },
}

/// Errors raised while mapping raw rows to records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("expected a JSON array of rows, found {0}")]
    NotAnArray(&'static str),
    #[error("row {index} is not a JSON object")]
    RowNotObject { index: usize },
    #[error("row {index} has a nested value for field `{field}`")]
    NestedValue { index: usize, field: String },
    #[error("row {index} is malformed: {reason}")]
    InvalidRow { index: usize, reason: String },
}
