//! Crate-wide error taxonomy.
//!
//! Stage boundaries (normalize, identity, delta, resolve, ingest, ...) return
//! `Result<T, SyncError>` rather than reaching for panics or `anyhow` — the
//! taxonomy here mirrors the error kinds the service must distinguish when
//! writing a `FailedRecord` row or deciding whether a failure is fatal to a
//! batch.

use std::collections::HashMap;
use thiserror::Error;

/// A structured error carrying its kind, a message, and optional machine-readable context.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct SyncError {
    pub kind: ErrorKind,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl SyncError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, message)
    }

    pub fn normalization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Normalization, message)
    }

    pub fn type_coercion(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeCoercion, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn identity_generation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IdentityGeneration, message)
    }

    pub fn delta_detection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DeltaDetection, message)
    }

    pub fn parent_child_resolution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParentChildResolution, message)
    }

    pub fn sync_execution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SyncExecution, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authorization, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }
}

/// The error taxonomy from the error-handling design: a closed set of kinds,
/// not a type per failure mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Connection,
    Normalization,
    TypeCoercion,
    Validation,
    IdentityGeneration,
    DeltaDetection,
    ParentChildResolution,
    SyncExecution,
    AlreadyExists,
    NotFound,
    Authentication,
    Authorization,
    Configuration,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Connection => "connection",
            Self::Normalization => "normalization",
            Self::TypeCoercion => "type_coercion",
            Self::Validation => "validation",
            Self::IdentityGeneration => "identity_generation",
            Self::DeltaDetection => "delta_detection",
            Self::ParentChildResolution => "parent_child_resolution",
            Self::SyncExecution => "sync_execution",
            Self::AlreadyExists => "already_exists",
            Self::NotFound => "not_found",
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::Configuration => "configuration",
        };
        write!(f, "{label}")
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::connection(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::connection(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::new(ErrorKind::Normalization, err.to_string())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
