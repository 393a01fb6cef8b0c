//! Default values for editor configuration.
//!
//! # Design
//! - Centralize defaults so the model, loader and validation agree.
//! - Keep time-based defaults explicit for auditability.

/// Remote branch the working tree is reset to before each edit.
pub const DEFAULT_REMOTE_BRANCH: &str = "master";
/// Bound on how long an edit waits for the course lock.
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;
/// Upper bound accepted for the lock timeout.
pub const MAX_LOCK_TIMEOUT_MS: u64 = 600_000;
/// Directory name (below the system temp dir) holding course lock files.
pub const DEFAULT_LOCK_DIR_NAME: &str = "quire-locks";
/// Log level used when neither config nor `RUST_LOG` supply one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Environment variable toggling version control.
pub const ENV_USE_GIT: &str = "QUIRE_USE_GIT";
/// Environment variable overriding the remote branch.
pub const ENV_REMOTE_BRANCH: &str = "QUIRE_REMOTE_BRANCH";
/// Environment variable supplying `GIT_SSH_COMMAND` for version-control steps.
pub const ENV_GIT_SSH_COMMAND: &str = "QUIRE_GIT_SSH_COMMAND";
/// Environment variable overriding the lock timeout.
pub const ENV_LOCK_TIMEOUT_MS: &str = "QUIRE_LOCK_TIMEOUT_MS";
/// Environment variable overriding the course lock file directory.
pub const ENV_LOCK_DIR: &str = "QUIRE_LOCK_DIR";
/// Environment variable overriding the job sequence directory.
pub const ENV_JOB_LOG_DIR: &str = "QUIRE_JOB_LOG_DIR";
/// Environment variable overriding the log level.
pub const ENV_LOG_LEVEL: &str = "QUIRE_LOG_LEVEL";
/// Environment variable overriding the log format.
pub const ENV_LOG_FORMAT: &str = "QUIRE_LOG_FORMAT";
