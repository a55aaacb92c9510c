use std::borrow::Cow;
use std::io;
use thiserror::Error;

/// Coarse classification of a store failure.
///
/// The import loop decides whether to evolve the schema and retry based on
/// this alone, never on the error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreErrorKind {
    NotFound,
    InvalidArgument,
    Other,
}

impl StoreErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            StoreErrorKind::NotFound => "not_found",
            StoreErrorKind::InvalidArgument => "invalid_argument",
            StoreErrorKind::Other => "other",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {details}")]
    NotFound { details: Cow<'static, str> },

    #[error("invalid argument: {details}")]
    InvalidArgument { details: Cow<'static, str> },

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    pub fn not_found(details: impl Into<Cow<'static, str>>) -> Self {
        StoreError::NotFound {
            details: details.into(),
        }
    }

    pub fn invalid_argument(details: impl Into<Cow<'static, str>>) -> Self {
        StoreError::InvalidArgument {
            details: details.into(),
        }
    }

    pub fn kind(&self) -> StoreErrorKind {
        match self {
            StoreError::NotFound { .. } => StoreErrorKind::NotFound,
            StoreError::InvalidArgument { .. } => {
                StoreErrorKind::InvalidArgument
            }
            StoreError::Io(_)
            | StoreError::Serialization(_)
            | StoreError::Other(_) => StoreErrorKind::Other,
        }
    }

    pub fn details(&self) -> String {
        match self {
            StoreError::NotFound { details } => details.to_string(),
            StoreError::InvalidArgument { details } => details.to_string(),
            StoreError::Io(e) => e.to_string(),
            StoreError::Serialization(e) => e.to_string(),
            StoreError::Other(e) => e.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
