//! Failure taxonomy of a reconciliation run.

use std::fmt;
use std::path::PathBuf;

use seedwork_storage::{ErrorCategory, StorageError};

/// Load message for a unit whose file has no content.
pub(crate) const EMPTY_UNIT: &str = "seems empty";

/// Errors raised while reconciling a template.
///
/// Only [`SyncError::Gate`] aborts a run; every other variant is caught at the
/// smallest unit (file, collection, field, relation, record batch) and logged.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The template root is missing or not writable.
    #[error("template directory {} could not be read: {source}", path.display())]
    Gate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A template file is missing, unreadable, empty or unparseable.
    #[error("could not load {unit}: {message}")]
    Load { unit: String, message: String },

    /// The backend rejected a create/update/upsert.
    #[error("could not apply {target}: {source}")]
    Apply {
        target: String,
        #[source]
        source: StorageError,
    },

    /// The external snapshot-apply invocation failed.
    #[error("schema snapshot apply failed: {message}")]
    ExternalTool { message: String },
}

impl SyncError {
    pub fn gate(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Gate {
            path: path.into(),
            source,
        }
    }

    pub fn load(unit: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load {
            unit: unit.into(),
            message: message.into(),
        }
    }

    pub fn apply(target: impl Into<String>, source: StorageError) -> Self {
        Self::Apply {
            target: target.into(),
            source,
        }
    }

    pub fn external_tool(message: impl Into<String>) -> Self {
        Self::ExternalTool {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Gate { .. } => FailureKind::Gate,
            Self::Load { .. } => FailureKind::Load,
            Self::Apply { .. } => FailureKind::Apply,
            Self::ExternalTool { .. } => FailureKind::ExternalTool,
        }
    }

    /// Backend error category of an apply failure, for logging.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            Self::Apply { source, .. } => Some(source.category()),
            _ => None,
        }
    }

    /// Returns `true` for a load failure caused by an empty file.
    pub fn is_empty_unit(&self) -> bool {
        matches!(self, Self::Load { message, .. } if message == EMPTY_UNIT)
    }

    /// Returns `true` if the error must end the run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Gate { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Gate,
    Load,
    Apply,
    ExternalTool,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gate => write!(f, "gate"),
            Self::Load => write!(f, "load"),
            Self::Apply => write!(f, "apply"),
            Self::ExternalTool => write!(f, "external_tool"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_failure_carries_backend_category() {
        let err = SyncError::apply("field articles-title", StorageError::connection("refused"));
        assert_eq!(err.category(), Some(ErrorCategory::Infrastructure));
        assert_eq!(SyncError::load("roles.json", EMPTY_UNIT).category(), None);
    }

    #[test]
    fn test_only_gate_is_fatal() {
        let gate = SyncError::gate(
            "/directus/templates",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(gate.is_fatal());
        assert_eq!(gate.kind(), FailureKind::Gate);

        assert!(!SyncError::load("roles", EMPTY_UNIT).is_fatal());
        assert!(SyncError::load("roles", EMPTY_UNIT).is_empty_unit());
        assert!(!SyncError::load("roles", "no such file").is_empty_unit());
        assert!(!SyncError::apply("field articles-title", StorageError::rejected("no")).is_fatal());
        assert!(!SyncError::external_tool("exit status 1").is_fatal());
    }

    #[test]
    fn test_messages_identify_the_unit() {
        let err = SyncError::load("permissions", "expected value at line 1 column 1");
        assert_eq!(
            err.to_string(),
            "could not load permissions: expected value at line 1 column 1"
        );

        let err = SyncError::apply(
            "collection articles",
            StorageError::rejected("group does not exist"),
        );
        assert_eq!(
            err.to_string(),
            "could not apply collection articles: Rejected by backend: group does not exist"
        );
        assert_eq!(err.kind().to_string(), "apply");
    }
}
