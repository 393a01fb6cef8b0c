//! # Design
//!
//! - Constant-message errors for the edit pipeline and its strategies.
//! - Context (paths, fields, steps) travels in structured fields.
//! - [`EditError::kind`] folds low-level variants into the failure taxonomy
//!   reported to callers.

use std::fmt::Write as _;
use std::io;
use std::path::PathBuf;

use quire_runtime::RuntimeError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for edit operations.
pub type EditResult<T> = Result<T, EditError>;

/// Errors produced while validating or executing an edit.
#[derive(Debug, Error)]
pub enum EditError {
    /// The actor may not edit this course.
    #[error("edit permission denied")]
    PermissionDenied {
        /// Course the edit targeted.
        course_id: String,
        /// Static reason for the rejection.
        reason: &'static str,
    },
    /// A requested identifier or path is not acceptable.
    #[error("invalid identifier")]
    InvalidIdentifier {
        /// Request field that failed validation.
        field: &'static str,
        /// Offending value.
        value: String,
        /// Static reason for the rejection.
        reason: &'static str,
    },
    /// The course lock could not be acquired.
    #[error("course is locked by another edit")]
    LockTimeout {
        /// Course directory the lock guards.
        course_path: PathBuf,
        /// Underlying lock error.
        source: RuntimeError,
    },
    /// A content mutation could not be applied.
    #[error("content mutation failed")]
    MutationFailure {
        /// Operation that failed.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Static reason for the failure.
        reason: &'static str,
    },
    /// IO failures while touching the course tree.
    #[error("course io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Descriptor parsing or serialization failures.
    #[error("descriptor json failure")]
    Json {
        /// Operation that triggered the JSON failure.
        operation: &'static str,
        /// Path involved in the JSON failure.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// Directory traversal failures.
    #[error("course walk failure")]
    Walkdir {
        /// Operation that triggered the traversal failure.
        operation: &'static str,
        /// Path involved in the traversal failure.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// A version-control command exited unsuccessfully.
    #[error("version control step failed")]
    VersioningFailure {
        /// Step that failed, e.g. `git_push`.
        step: &'static str,
        /// Exit code when the process exited normally.
        exit_code: Option<i32>,
    },
    /// A version-control command could not be run at all.
    #[error("version control process failed")]
    Process {
        /// Step that failed.
        step: &'static str,
        /// Underlying runtime error.
        source: RuntimeError,
    },
    /// Releasing the course lock failed.
    #[error("course unlock failed")]
    UnlockFailure {
        /// Course directory the lock guards.
        course_path: PathBuf,
        /// Underlying lock error.
        source: RuntimeError,
    },
    /// A step after the durable mutation failed.
    #[error("post-commit step failed")]
    PostCommitFailure {
        /// Step that failed.
        step: &'static str,
        /// Rendered failure detail.
        detail: String,
    },
    /// The job recorder rejected an operation.
    #[error("job recorder failure")]
    Recorder {
        /// Underlying runtime error.
        source: RuntimeError,
    },
    /// An external collaborator (synchronizer, cache, revision store) failed.
    #[error("collaborator failure")]
    Collaborator {
        /// Collaborator that failed.
        component: &'static str,
        /// Rendered failure detail.
        detail: String,
    },
}

/// Failure categories surfaced in edit reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Actor lacks edit authority or the course is protected.
    PermissionDenied,
    /// A target escapes its root or violates naming rules.
    InvalidIdentifier,
    /// The course is being edited by someone else.
    LockTimeout,
    /// The write step failed.
    MutationFailure,
    /// A version-control step failed.
    VersioningFailure,
    /// Releasing the lock failed.
    UnlockFailure,
    /// A step after the durable mutation failed.
    PostCommitFailure,
    /// The audit recorder failed.
    Recorder,
}

impl FailureKind {
    /// Lowercase label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission_denied",
            Self::InvalidIdentifier => "invalid_identifier",
            Self::LockTimeout => "lock_timeout",
            Self::MutationFailure => "mutation_failure",
            Self::VersioningFailure => "versioning_failure",
            Self::UnlockFailure => "unlock_failure",
            Self::PostCommitFailure => "post_commit_failure",
            Self::Recorder => "recorder",
        }
    }
}

impl EditError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: serde_json::Error,
    ) -> Self {
        Self::Json {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walkdir(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: walkdir::Error,
    ) -> Self {
        Self::Walkdir {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn mutation(
        operation: &'static str,
        path: impl Into<PathBuf>,
        reason: &'static str,
    ) -> Self {
        Self::MutationFailure {
            operation,
            path: path.into(),
            reason,
        }
    }

    pub(crate) fn invalid(field: &'static str, value: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidIdentifier {
            field,
            value: value.into(),
            reason,
        }
    }

    /// Category of this error in the reported taxonomy.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::PermissionDenied { .. } => FailureKind::PermissionDenied,
            Self::InvalidIdentifier { .. } => FailureKind::InvalidIdentifier,
            Self::LockTimeout { .. } => FailureKind::LockTimeout,
            Self::MutationFailure { .. }
            | Self::Io { .. }
            | Self::Json { .. }
            | Self::Walkdir { .. } => FailureKind::MutationFailure,
            Self::VersioningFailure { .. } | Self::Process { .. } => FailureKind::VersioningFailure,
            Self::UnlockFailure { .. } => FailureKind::UnlockFailure,
            Self::PostCommitFailure { .. } | Self::Collaborator { .. } => {
                FailureKind::PostCommitFailure
            }
            Self::Recorder { .. } => FailureKind::Recorder,
        }
    }

    /// Human-readable rendering including structured context and the source chain.
    #[must_use]
    pub fn detail(&self) -> String {
        let mut out = match self {
            Self::PermissionDenied { reason, .. } => match *reason {
                "example_course" => "Access denied (cannot edit the example course)".to_string(),
                _ => "Access denied (must be course editor)".to_string(),
            },
            Self::InvalidIdentifier {
                field,
                value,
                reason,
            } => format!("invalid {field} {value:?}: {reason}"),
            Self::LockTimeout { course_path, .. } => format!(
                "Another user is already syncing or modifying the course: {}",
                course_path.display()
            ),
            Self::MutationFailure {
                operation,
                path,
                reason,
            } => format!("{operation} failed for {}: {reason}", path.display()),
            Self::Io {
                operation, path, ..
            }
            | Self::Json {
                operation, path, ..
            }
            | Self::Walkdir {
                operation, path, ..
            } => format!("{operation} failed for {}", path.display()),
            Self::VersioningFailure { step, exit_code } => match exit_code {
                Some(code) => format!("{step} exited with status {code}"),
                None => format!("{step} terminated by signal"),
            },
            Self::Process { step, .. } => format!("{step} could not be run"),
            Self::UnlockFailure { course_path, .. } => {
                format!("failed to unlock course {}", course_path.display())
            }
            Self::PostCommitFailure { step, detail } => format!("{step}: {detail}"),
            Self::Recorder { .. } => "job recorder failure".to_string(),
            Self::Collaborator { component, detail } => format!("{component}: {detail}"),
        };
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            let _ = write!(out, ": {err}");
            source = err.source();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_variants_fold_into_mutation_failure() {
        let err = EditError::io(
            "write.copy",
            "/course/questions/q1",
            io::Error::other("disk full"),
        );
        assert_eq!(err.kind(), FailureKind::MutationFailure);
        assert_eq!(
            err.detail(),
            "write.copy failed for /course/questions/q1: disk full"
        );
    }

    #[test]
    fn lock_timeout_detail_names_the_course() {
        let err = EditError::LockTimeout {
            course_path: PathBuf::from("/srv/course"),
            source: RuntimeError::LockTimeout {
                name: "coursedir:/srv/course".to_string(),
                waited_ms: 5_000,
            },
        };
        assert!(
            err.detail()
                .starts_with("Another user is already syncing or modifying the course: /srv/course")
        );
        assert_eq!(err.kind().as_str(), "lock_timeout");
    }

    #[test]
    fn permission_detail_distinguishes_example_course() {
        let example = EditError::PermissionDenied {
            course_id: "1".to_string(),
            reason: "example_course",
        };
        let editor = EditError::PermissionDenied {
            course_id: "1".to_string(),
            reason: "missing_edit_permission",
        };
        assert!(example.detail().contains("example course"));
        assert!(editor.detail().contains("course editor"));
    }
}
