//! Error types for configuration loading.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Section that failed validation.
        section: &'static str,
        /// Field that failed validation.
        field: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Environment override could not be parsed.
    #[error("invalid environment override")]
    InvalidEnv {
        /// Variable name.
        variable: &'static str,
        /// Raw value supplied.
        value: String,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Configuration document was not valid JSON for the model.
    #[error("failed to parse configuration document")]
    Parse {
        /// Document path.
        path: PathBuf,
        /// Source parse error.
        source: serde_json::Error,
    },
    /// File system operation failed.
    #[error("configuration file access failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
