//! Error types for conversions and store access

use thiserror::Error;

/// Failures raised by the converters
///
/// These are "bad data" failures: the document or path handed to the
/// converter cannot name a destination. Connectivity problems never appear
/// here; they surface as [`StoreError::Backend`] from the store itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// The key builder rejected a path (empty, odd length, empty kind, ...)
    #[error("Key construction failed: {0}")]
    KeyConstruction(String),

    /// No key could be resolved for a write and no fallback kind was given
    #[error("Unable to construct key for document: {document}")]
    AmbiguousKey { document: String },
}

impl ConversionError {
    /// Create a key construction error
    pub fn key_construction<S: Into<String>>(msg: S) -> Self {
        Self::KeyConstruction(msg.into())
    }

    /// Check if the error is about the destination rather than the content
    pub fn is_ambiguous_key(&self) -> bool {
        matches!(self, Self::AmbiguousKey { .. })
    }
}

/// Result type for conversions
pub type ConversionResult<T> = Result<T, ConversionError>;

/// Errors raised by entity store implementations and the glue above them
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Create a generic backend error
    pub fn backend<S: Into<String>>(msg: S) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        Self::Serialization(msg.into())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
