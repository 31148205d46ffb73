//! Error types for reposcope

use serde::Serialize;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum ReposcopeError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Watcher error: {0}")]
    Watcher(#[from] notify::Error),

    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("Repository not open")]
    RepositoryNotOpen,

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Commit not found: {0}")]
    CommitNotFound(String),

    #[error("No remotes configured")]
    NoRemotes,

    #[error("No current branch")]
    NoCurrentBranch,

    #[error("Commit message is empty")]
    EmptyCommitMessage,

    #[error("Nothing to commit")]
    NothingToCommit,

    #[error("Another operation is still running")]
    OperationBusy,

    #[error("`git {command}` failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("{0}")]
    Custom(String),
}

impl ReposcopeError {
    /// Stable machine-readable code for the error
    pub fn code(&self) -> &'static str {
        match self {
            ReposcopeError::Git(_) => "GIT_ERROR",
            ReposcopeError::Io(_) => "IO_ERROR",
            ReposcopeError::Serialization(_) => "SERIALIZATION_ERROR",
            ReposcopeError::Watcher(_) => "WATCHER_ERROR",
            ReposcopeError::RepositoryNotFound(_) => "REPO_NOT_FOUND",
            ReposcopeError::RepositoryNotOpen => "REPO_NOT_OPEN",
            ReposcopeError::InvalidPath(_) => "INVALID_PATH",
            ReposcopeError::CommitNotFound(_) => "COMMIT_NOT_FOUND",
            ReposcopeError::NoRemotes => "NO_REMOTES",
            ReposcopeError::NoCurrentBranch => "NO_CURRENT_BRANCH",
            ReposcopeError::EmptyCommitMessage => "EMPTY_COMMIT_MESSAGE",
            ReposcopeError::NothingToCommit => "NOTHING_TO_COMMIT",
            ReposcopeError::OperationBusy => "OPERATION_BUSY",
            ReposcopeError::CommandFailed { .. } => "COMMAND_FAILED",
            ReposcopeError::OperationFailed(_) => "OPERATION_FAILED",
            ReposcopeError::Custom(_) => "CUSTOM_ERROR",
        }
    }

    /// Whether the error was caught before any git command ran
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ReposcopeError::NoRemotes
                | ReposcopeError::NoCurrentBranch
                | ReposcopeError::EmptyCommitMessage
                | ReposcopeError::NothingToCommit
                | ReposcopeError::OperationBusy
        )
    }
}

/// Serializable error response for frontends
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl From<&ReposcopeError> for ErrorResponse {
    fn from(error: &ReposcopeError) -> Self {
        let details = match error {
            ReposcopeError::CommandFailed { command, .. } => Some(format!("git {}", command)),
            _ => None,
        };

        ErrorResponse {
            code: error.code().to_string(),
            message: error.to_string(),
            details,
        }
    }
}

impl serde::Serialize for ReposcopeError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        ErrorResponse::from(self).serialize(serializer)
    }
}

/// Result type alias for reposcope operations
pub type Result<T> = std::result::Result<T, ReposcopeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_response_carries_command() {
        let error = ReposcopeError::CommandFailed {
            command: "add -- a.txt".to_string(),
            message: "fatal: pathspec did not match".to_string(),
        };

        let response = ErrorResponse::from(&error);
        assert_eq!(response.code, "COMMAND_FAILED");
        assert_eq!(response.details.as_deref(), Some("git add -- a.txt"));
        assert!(response.message.contains("pathspec"));
    }

    #[test]
    fn test_precondition_classification() {
        assert!(ReposcopeError::EmptyCommitMessage.is_precondition());
        assert!(ReposcopeError::NoRemotes.is_precondition());
        assert!(!ReposcopeError::OperationFailed("x".to_string()).is_precondition());
    }

    #[test]
    fn test_error_serializes_as_response() {
        let json = serde_json::to_string(&ReposcopeError::RepositoryNotOpen).unwrap();
        assert!(json.contains("REPO_NOT_OPEN"));
        assert!(json.contains("Repository not open"));
    }
}
