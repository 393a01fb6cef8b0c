//! Typed configuration model for the course editor.
//!
//! # Design
//! - Pure data carriers; loading lives in `loader.rs` and checks in `validate.rs`.
//! - Every field has a default so partial JSON documents are accepted.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults::{
    DEFAULT_LOCK_DIR_NAME, DEFAULT_LOCK_TIMEOUT_MS, DEFAULT_LOG_LEVEL, DEFAULT_REMOTE_BRANCH,
};

/// Settings consumed by the edit pipeline and the CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct EditorConfig {
    /// Wrap every edit in clean/reset/stage/commit/push steps.
    pub use_git: bool,
    /// Remote branch used by the reset-to-remote step.
    pub remote_branch: String,
    /// Optional `GIT_SSH_COMMAND` exported to version-control processes.
    pub git_ssh_command: Option<String>,
    /// Maximum time to wait for the course lock, in milliseconds.
    pub lock_timeout_ms: u64,
    /// Directory of the advisory course lock files shared between processes.
    pub lock_dir: Option<PathBuf>,
    /// Path of the permanently read-only example course.
    pub example_course_path: Option<PathBuf>,
    /// Template question directory copied by "add question".
    pub question_template_dir: Option<PathBuf>,
    /// Directory where job sequences are persisted as JSON.
    pub job_log_dir: Option<PathBuf>,
    /// Logging preferences.
    pub logging: LoggingSettings,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            use_git: false,
            remote_branch: DEFAULT_REMOTE_BRANCH.to_string(),
            git_ssh_command: None,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            lock_dir: None,
            example_course_path: None,
            question_template_dir: None,
            job_log_dir: None,
            logging: LoggingSettings::default(),
        }
    }
}

impl EditorConfig {
    /// Lock acquisition bound as a [`Duration`].
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Lock file directory, `<tmp>/quire-locks` unless configured.
    #[must_use]
    pub fn lock_dir(&self) -> PathBuf {
        self.lock_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_LOCK_DIR_NAME))
    }

    /// Environment pairs exported to version-control processes.
    #[must_use]
    pub fn git_env(&self) -> Vec<(String, String)> {
        self.git_ssh_command
            .iter()
            .map(|command| ("GIT_SSH_COMMAND".to_string(), command.clone()))
            .collect()
    }
}

/// Logging preferences mapped onto the telemetry subscriber.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    /// Level directive, e.g. `info` or `quire_editor=debug`.
    pub level: String,
    /// `json` or `pretty`; inferred from the build profile when absent.
    pub format: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: None,
        }
    }
}
