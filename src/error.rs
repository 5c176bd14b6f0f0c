//! Error types for schema construction, encoding, decoding and the collaborators

use thiserror::Error;

use crate::registry::RegistryError;
use crate::transport::TransportError;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema evolution errors
///
/// `path` fields are dotted field paths from the root record (e.g. `payload.addressTo`);
/// an empty path means the root record itself.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Type mismatch at '{path}': expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Missing field '{field}' in record {record}")]
    MissingField { record: String, field: String },

    #[error("Fixed size mismatch at '{path}': expected {expected} bytes, got {actual}")]
    FixedSizeMismatch {
        path: String,
        expected: usize,
        actual: usize,
    },

    #[error("Schema resolution failed at '{path}': writer {writer} cannot be read as {reader}")]
    SchemaResolution {
        path: String,
        writer: String,
        reader: String,
    },

    #[error("Unresolved union variant at '{path}': {detail}")]
    UnresolvedUnionVariant { path: String, detail: String },

    #[error("Malformed payload at byte {offset}: {reason}")]
    MalformedPayload { offset: usize, reason: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SchemaError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        SchemaError::InvalidSchema(reason.into())
    }

    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        SchemaError::MalformedPayload {
            offset,
            reason: reason.into(),
        }
    }

    /// Whether this error is caused by the data or schemas rather than a collaborator.
    ///
    /// Caller-data errors are never worth retrying: the value or the schema pair must be fixed.
    pub fn is_data_error(&self) -> bool {
        !matches!(
            self,
            SchemaError::Transport(_) | SchemaError::Registry(_) | SchemaError::Io(_)
        )
    }
}
