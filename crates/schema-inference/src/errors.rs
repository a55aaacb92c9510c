//! Error types for schema inference.

use thiserror::Error;

/// Errors that can occur while inferring or evolving a schema.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// A document in the batch is not valid JSON
    #[error("failed to parse document {index}: {source}")]
    JsonParse {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Documents must be JSON objects at the top level
    #[error("document {index} is not a JSON object (found {found})")]
    NotAnObject { index: usize, found: &'static str },

    /// Two samples impose incompatible types on the same field
    #[error("schema conflict at '{path}': {left} vs {right}")]
    Conflict {
        path: String,
        left: String,
        right: String,
    },

    /// The accumulated schema could not be serialized
    #[error("schema serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// A stored schema could not be read back
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
}

impl InferenceError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, InferenceError::Conflict { .. })
    }
}

/// Result type for inference operations.
pub type InferenceResult<T> = Result<T, InferenceError>;
