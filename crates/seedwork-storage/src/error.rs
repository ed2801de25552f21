//! Backend error types for the seedwork port layer.
//!
//! This module defines all error types a backend can return from a port call.

use std::fmt;

/// Errors that can occur while talking to a content backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested object was not found.
    #[error("Not found: {kind}/{id}")]
    NotFound {
        /// The kind of object (collection, field, relation, item collection).
        kind: String,
        /// Identity of the missing object.
        id: String,
    },

    /// Attempted to create an object that already exists.
    #[error("Already exists: {kind}/{id}")]
    AlreadyExists {
        /// The kind of object that already exists.
        kind: String,
        /// Identity of the existing object.
        id: String,
    },

    /// The backend refused the payload.
    #[error("Rejected by backend: {message}")]
    Rejected {
        /// Message reported by the backend.
        message: String,
    },

    /// Failed to reach the backend.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the transport failure.
        message: String,
    },

    /// Some records of a batch were written and some were not.
    #[error("Batch partially applied ({created} created, {updated} updated, {failed} failed): {first}")]
    PartialBatch {
        /// Records created before and after the failures.
        created: usize,
        /// Records updated before and after the failures.
        updated: usize,
        /// Records that could not be written.
        failed: usize,
        /// The first failure in batch order.
        first: Box<StorageError>,
    },

    /// An internal backend error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Creates a new `AlreadyExists` error.
    #[must_use]
    pub fn already_exists(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Creates a new `Rejected` error.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is an already exists error.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::AlreadyExists { .. } => ErrorCategory::Conflict,
            Self::Rejected { .. } => ErrorCategory::Validation,
            Self::Connection { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
            Self::PartialBatch { first, .. } => first.category(),
        }
    }
}

/// Categories of backend errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Object not found.
    NotFound,
    /// Conflict with an existing object.
    Conflict,
    /// Payload refused by the backend.
    Validation,
    /// Transport/connection error.
    Infrastructure,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
