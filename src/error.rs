//! Error taxonomy for header parsing, serialization and shape translation.

use thiserror::Error;

/// Errors that can occur while reading, writing or reshaping a header.
#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("Truncated input at byte {offset}: `{field}` needs {needed} bytes, {available} available")]
    TruncatedInput {
        field: String,
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Invalid count {count} for `{field}` (from `{reference}`)")]
    InvalidCount {
        field: String,
        reference: String,
        count: i64,
    },

    #[error("Count mismatch for `{field}`: `{reference}` holds {expected}, found {actual}")]
    CountMismatch {
        field: String,
        reference: String,
        expected: usize,
        actual: usize,
    },

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Header data error: {0}")]
    HeaderData(String),

    #[error("Format constraint violated: {0}")]
    FormatConstraint(String),

    #[error("Type mismatch for `{field}`: expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Value {value} out of range for {ty} field `{field}`")]
    OutOfRange {
        field: String,
        ty: &'static str,
        value: String,
    },

    #[error("Unresolved field reference `{reference}` used by `{field}`")]
    UnresolvedReference { field: String, reference: String },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HeaderError>;

impl HeaderError {
    pub(crate) fn header_data(msg: impl Into<String>) -> Self {
        Self::HeaderData(msg.into())
    }
}
