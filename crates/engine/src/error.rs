//! The module contains the errors the engine can return.
//!
//! Caller-correctable errors ([`Validation`], [`BatchValidation`],
//! [`InvalidJson`], [`MalformedExtraction`]) carry the offending field or the
//! raw model text so the client can fix and resubmit. [`Database`] and
//! [`ExtractionService`] are internal faults.
//!
//!  [`Validation`]: EngineError::Validation
//!  [`BatchValidation`]: EngineError::BatchValidation
//!  [`InvalidJson`]: EngineError::InvalidJson
//!  [`MalformedExtraction`]: EngineError::MalformedExtraction
//!  [`Database`]: EngineError::Database
//!  [`ExtractionService`]: EngineError::ExtractionService
use std::fmt;

use sea_orm::DbErr;
use thiserror::Error;

/// A single rejected field of a record-shaped value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

impl std::error::Error for FieldError {}

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Missing, malformed, forged or expired credential. Never says which.
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("invalid {0}")]
    Validation(FieldError),
    #[error("transaction #{index}: invalid {error}")]
    BatchValidation { index: usize, error: FieldError },
    #[error("model returned invalid JSON")]
    InvalidJson { raw: String },
    #[error("invalid model response format: {reason}")]
    MalformedExtraction { raw: String, reason: String },
    #[error("text generation service error: {0}")]
    ExtractionService(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("credential error: {0}")]
    Credential(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl From<FieldError> for EngineError {
    fn from(value: FieldError) -> Self {
        Self::Validation(value)
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unauthenticated, Self::Unauthenticated) => true,
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (
                Self::BatchValidation { index: a, error: ea },
                Self::BatchValidation { index: b, error: eb },
            ) => a == b && ea == eb,
            (Self::InvalidJson { raw: a }, Self::InvalidJson { raw: b }) => a == b,
            (
                Self::MalformedExtraction { raw: a, reason: ra },
                Self::MalformedExtraction { raw: b, reason: rb },
            ) => a == b && ra == rb,
            (Self::ExtractionService(a), Self::ExtractionService(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::Credential(a), Self::Credential(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
