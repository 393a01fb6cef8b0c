//! # Design
//!
//! - Constant-message errors for job recording, course locks and child processes.
//! - Context (lock names, job numbers, paths) travels in fields, not in messages.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::jobs::SequenceId;

/// Result type for runtime primitives.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors produced by the runtime primitives.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The named lock was not acquired within the bound.
    #[error("lock acquisition timed out")]
    LockTimeout {
        /// Lock name.
        name: String,
        /// Time spent waiting, in milliseconds.
        waited_ms: u64,
    },
    /// The named lock could not be released.
    #[error("lock release failed")]
    LockRelease {
        /// Lock name.
        name: String,
        /// Static reason for the failure.
        reason: &'static str,
    },
    /// The lock file backing a named lock could not be opened or locked.
    #[error("lock file io failed")]
    LockFile {
        /// Lock name.
        name: String,
        /// Lock file or its directory.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// No sequence exists with the requested id.
    #[error("job sequence not found")]
    UnknownSequence {
        /// Requested sequence.
        sequence_id: SequenceId,
    },
    /// No job exists at the requested position.
    #[error("job not found")]
    UnknownJob {
        /// Owning sequence.
        sequence_id: SequenceId,
        /// Job position within the sequence.
        job_number: usize,
    },
    /// The job or sequence already reached a terminal state.
    #[error("job already finished")]
    AlreadyFinished {
        /// Owning sequence.
        sequence_id: SequenceId,
        /// Job position, absent when the sequence itself is finished.
        job_number: Option<usize>,
    },
    /// A child process could not be started.
    #[error("process spawn failed")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Reading child output or waiting on the child failed.
    #[error("process io failed")]
    ProcessIo {
        /// Program being supervised.
        program: String,
        /// Underlying IO error.
        source: io::Error,
    },
    /// IO failures while persisting sequences.
    #[error("job persistence io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// JSON failures while persisting sequences.
    #[error("job persistence json failure")]
    Json {
        /// Operation that triggered the JSON failure.
        operation: &'static str,
        /// Path involved in the JSON failure.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

impl RuntimeError {
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
}
