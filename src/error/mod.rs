use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub mod codes;

pub use codes::{describe_error_code, ErrorCode};

/// Error-kind tokens accumulated in the execution context of a run.
///
/// A run may record several kinds at once (a restore failure is both a
/// `Git` error and a `RestoreOriginalState` error); the phase rules in
/// [`crate::state`] inspect this set to decide what runs next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    ConfigNotFound,
    ConfigFormat,
    InvalidOptions,
    Validation,
    Git,
    GetBackupStash,
    HideUnstagedChanges,
    RestoreUnstagedChanges,
    RestoreOriginalState,
    RestoreMergeStatus,
    Task,
    ApplyEmptyCommit,
    Interrupted,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ConfigNotFound => "ConfigNotFoundError",
            ErrorKind::ConfigFormat => "ConfigFormatError",
            ErrorKind::InvalidOptions => "InvalidOptionsError",
            ErrorKind::Validation => "ValidationError",
            ErrorKind::Git => "GitError",
            ErrorKind::GetBackupStash => "GetBackupStashError",
            ErrorKind::HideUnstagedChanges => "HideUnstagedChangesError",
            ErrorKind::RestoreUnstagedChanges => "RestoreUnstagedChangesError",
            ErrorKind::RestoreOriginalState => "RestoreOriginalStateError",
            ErrorKind::RestoreMergeStatus => "RestoreMergeStatusError",
            ErrorKind::Task => "TaskError",
            ErrorKind::ApplyEmptyCommit => "ApplyEmptyCommitError",
            ErrorKind::Interrupted => "InterruptedError",
        };
        f.write_str(name)
    }
}

/// The unified error type surfaced by the library
#[derive(Error, Debug)]
pub enum StageGateError {
    #[error("[E{code:04}] Configuration error: {message}")]
    Config {
        code: u16,
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Git operation failed: {message}")]
    Git {
        code: u16,
        message: String,
        operation: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Validation error: {message}")]
    Validation {
        code: u16,
        message: String,
        field: Option<String>,
    },
}

impl StageGateError {
    /// Create a configuration error with specific code
    pub fn config_with_code(code: u16, message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::Config {
            code,
            message: message.into(),
            path,
            source: None,
        }
    }

    /// Create a git error with specific code and operation
    pub fn git(code: u16, message: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Git {
            code,
            message: message.into(),
            operation: operation.into(),
            source: None,
        }
    }

    /// Create a validation error with default code
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            code: ErrorCode::VALIDATION_GENERIC,
            message: message.into(),
            field: None,
        }
    }

    /// Create a validation error with specific code and field
    pub fn validation_with_code(
        code: u16,
        message: impl Into<String>,
        field: Option<String>,
    ) -> Self {
        Self::Validation {
            code,
            message: message.into(),
            field,
        }
    }

    /// Add a source error to this error
    pub fn with_source(
        mut self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        match &mut self {
            Self::Config { source: src, .. } | Self::Git { source: src, .. } => {
                *src = Some(source.into());
            }
            Self::Validation { .. } => {}
        }
        self
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::Config { code, .. }
            | Self::Git { code, .. }
            | Self::Validation { code, .. } => *code,
        }
    }

    /// The error kinds this error records in the execution context
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self {
            Self::Config { code, .. } if *code == ErrorCode::CONFIG_NOT_FOUND => {
                vec![ErrorKind::ConfigNotFound]
            }
            Self::Config { .. } => vec![ErrorKind::ConfigFormat],
            Self::Git { code, .. } => match *code {
                ErrorCode::GIT_BACKUP_MISSING => vec![ErrorKind::GetBackupStash],
                ErrorCode::GIT_HIDE_UNSTAGED => {
                    vec![ErrorKind::Git, ErrorKind::HideUnstagedChanges]
                }
                ErrorCode::GIT_RESTORE_UNSTAGED => {
                    vec![ErrorKind::Git, ErrorKind::RestoreUnstagedChanges]
                }
                ErrorCode::GIT_RESTORE_ORIGINAL => {
                    vec![ErrorKind::Git, ErrorKind::RestoreOriginalState]
                }
                ErrorCode::GIT_MERGE_STATUS => vec![ErrorKind::Git, ErrorKind::RestoreMergeStatus],
                ErrorCode::GIT_EMPTY_COMMIT => vec![ErrorKind::Git, ErrorKind::ApplyEmptyCommit],
                _ => vec![ErrorKind::Git],
            },
            Self::Validation { code, .. } if *code == ErrorCode::VALIDATION_INVALID_OPTIONS => {
                vec![ErrorKind::InvalidOptions]
            }
            Self::Validation { .. } => vec![ErrorKind::Validation],
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Config { message, path, .. } => match path {
                Some(p) => format!("Configuration problem in {}: {}", p.display(), message),
                None => format!("Configuration problem: {}", message),
            },
            Self::Git { message, .. } => message.clone(),
            Self::Validation { message, field, .. } => match field {
                Some(f) => format!("Validation error for '{}': {}", f, message),
                None => format!("Validation error: {}", message),
            },
        }
    }
}

/// Type alias for Results using StageGateError
pub type Result<T> = std::result::Result<T, StageGateError>;

impl From<crate::git::GitError> for StageGateError {
    fn from(err: crate::git::GitError) -> Self {
        let code = err.code();
        StageGateError::git(code, err.to_string(), err.operation()).with_source(err)
    }
}

impl From<crate::config::ConfigError> for StageGateError {
    fn from(err: crate::config::ConfigError) -> Self {
        let code = err.code();
        let path = err.path().map(|p| p.to_path_buf());
        StageGateError::config_with_code(code, err.to_string(), path).with_source(err)
    }
}

impl From<crate::matching::PatternError> for StageGateError {
    fn from(err: crate::matching::PatternError) -> Self {
        StageGateError::validation_with_code(
            ErrorCode::VALIDATION_INVALID_PATTERN,
            err.to_string(),
            Some(err.pattern().to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_code() {
        let err = StageGateError::git(ErrorCode::GIT_REPO_LOCKED, "index is locked", "prepare");
        assert!(err.to_string().contains("[E6003]"));
        assert_eq!(err.code(), ErrorCode::GIT_REPO_LOCKED);
    }

    #[test]
    fn test_kinds_for_git_codes() {
        let err = StageGateError::git(ErrorCode::GIT_EMPTY_COMMIT, "empty", "apply");
        assert_eq!(err.kinds(), vec![ErrorKind::Git, ErrorKind::ApplyEmptyCommit]);

        let err = StageGateError::git(ErrorCode::GIT_BACKUP_MISSING, "missing", "restore");
        assert_eq!(err.kinds(), vec![ErrorKind::GetBackupStash]);
    }

    #[test]
    fn test_kinds_for_config_and_validation() {
        let err = StageGateError::config_with_code(ErrorCode::CONFIG_NOT_FOUND, "none", None);
        assert_eq!(err.kinds(), vec![ErrorKind::ConfigNotFound]);

        let err = StageGateError::validation_with_code(
            ErrorCode::VALIDATION_INVALID_OPTIONS,
            "--all conflicts with --diff",
            None,
        );
        assert_eq!(err.kinds(), vec![ErrorKind::InvalidOptions]);
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::ApplyEmptyCommit.to_string(), "ApplyEmptyCommitError");
        assert_eq!(ErrorKind::Git.to_string(), "GitError");
    }
}
