//! Validation helpers and parsing utilities for configuration values.

use crate::defaults::MAX_LOCK_TIMEOUT_MS;
use crate::error::{ConfigError, ConfigResult};
use crate::model::EditorConfig;

/// Check a fully merged configuration.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for the first field that fails.
pub fn validate(config: &EditorConfig) -> ConfigResult<()> {
    validate_branch(&config.remote_branch)?;

    if config.lock_timeout_ms == 0 || config.lock_timeout_ms > MAX_LOCK_TIMEOUT_MS {
        return Err(ConfigError::InvalidField {
            section: "editor",
            field: "lock_timeout_ms",
            value: Some(config.lock_timeout_ms.to_string()),
            reason: "out_of_range",
        });
    }

    if let Some(command) = &config.git_ssh_command
        && command.trim().is_empty()
    {
        return Err(ConfigError::InvalidField {
            section: "editor",
            field: "git_ssh_command",
            value: Some(command.clone()),
            reason: "empty",
        });
    }

    if config.logging.level.trim().is_empty() {
        return Err(ConfigError::InvalidField {
            section: "logging",
            field: "level",
            value: None,
            reason: "empty",
        });
    }

    if let Some(format) = &config.logging.format
        && !matches!(format.as_str(), "json" | "pretty")
    {
        return Err(ConfigError::InvalidField {
            section: "logging",
            field: "format",
            value: Some(format.clone()),
            reason: "unsupported",
        });
    }

    Ok(())
}

fn validate_branch(branch: &str) -> ConfigResult<()> {
    let reason = if branch.is_empty() {
        Some("empty")
    } else if branch.starts_with('-') {
        Some("leading_dash")
    } else if branch.chars().any(char::is_whitespace) || branch.contains("..") {
        Some("invalid_ref")
    } else {
        None
    };

    reason.map_or(Ok(()), |reason| {
        Err(ConfigError::InvalidField {
            section: "editor",
            field: "remote_branch",
            value: Some(branch.to_string()),
            reason,
        })
    })
}

/// Parse a boolean environment override (`1/0`, `true/false`, `yes/no`, `on/off`).
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnv`] for any other value.
pub fn parse_bool(variable: &'static str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            variable,
            value: value.to_string(),
            reason: "expected_boolean",
        }),
    }
}

/// Parse an unsigned integer environment override.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnv`] when the value is not a base-10 integer.
pub fn parse_u64(variable: &'static str, value: &str) -> ConfigResult<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidEnv {
            variable,
            value: value.to_string(),
            reason: "expected_integer",
        })
}
