//! Configuration loading from an optional JSON document plus environment overrides.
//!
//! # Design
//! - Precedence: defaults, then the document, then environment variables.
//! - Environment access goes through a lookup closure so tests stay hermetic.
//! - The merged result is validated before it is returned.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::defaults::{
    ENV_GIT_SSH_COMMAND, ENV_JOB_LOG_DIR, ENV_LOCK_DIR, ENV_LOCK_TIMEOUT_MS, ENV_LOG_FORMAT,
    ENV_LOG_LEVEL, ENV_REMOTE_BRANCH, ENV_USE_GIT,
};
use crate::error::{ConfigError, ConfigResult};
use crate::model::EditorConfig;
use crate::validate::{parse_bool, parse_u64, validate};

/// Load configuration using the process environment.
///
/// # Errors
///
/// Returns an error when the document cannot be read or parsed, an override is
/// malformed, or the merged configuration fails validation.
pub fn load(path: Option<&Path>) -> ConfigResult<EditorConfig> {
    load_with_env(path, |name| std::env::var(name).ok())
}

/// Load configuration using a caller-supplied environment lookup.
///
/// # Errors
///
/// See [`load`].
pub fn load_with_env<F>(path: Option<&Path>, lookup: F) -> ConfigResult<EditorConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => read_document(path)?,
        None => EditorConfig::default(),
    };
    apply_env(&mut config, &lookup)?;
    validate(&config)?;
    debug!(
        use_git = config.use_git,
        remote_branch = %config.remote_branch,
        lock_timeout_ms = config.lock_timeout_ms,
        "editor configuration loaded"
    );
    Ok(config)
}

fn read_document(path: &Path) -> ConfigResult<EditorConfig> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "config.read",
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn apply_env<F>(config: &mut EditorConfig, lookup: &F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(ENV_USE_GIT) {
        config.use_git = parse_bool(ENV_USE_GIT, &value)?;
    }
    if let Some(value) = lookup(ENV_REMOTE_BRANCH) {
        config.remote_branch = value.trim().to_string();
    }
    if let Some(value) = lookup(ENV_GIT_SSH_COMMAND) {
        config.git_ssh_command = Some(value);
    }
    if let Some(value) = lookup(ENV_LOCK_TIMEOUT_MS) {
        config.lock_timeout_ms = parse_u64(ENV_LOCK_TIMEOUT_MS, &value)?;
    }
    if let Some(value) = lookup(ENV_LOCK_DIR) {
        config.lock_dir = Some(PathBuf::from(value));
    }
    if let Some(value) = lookup(ENV_JOB_LOG_DIR) {
        config.job_log_dir = Some(PathBuf::from(value));
    }
    if let Some(value) = lookup(ENV_LOG_LEVEL) {
        config.logging.level = value;
    }
    if let Some(value) = lookup(ENV_LOG_FORMAT) {
        config.logging.format = Some(value.trim().to_ascii_lowercase());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::collections::HashMap;

    type TestResult<T> = Result<T>;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_without_document_or_env() -> TestResult<()> {
        let config = load_with_env(None, env(&[]))?;
        assert_eq!(config, EditorConfig::default());
        assert_eq!(config.lock_timeout().as_millis(), 5_000);
        Ok(())
    }

    #[test]
    fn document_values_are_read() -> TestResult<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("quire.json");
        fs::write(
            &path,
            r#"{"use_git": true, "remote_branch": "main", "logging": {"format": "json"}}"#,
        )?;

        let config = load_with_env(Some(&path), env(&[]))?;
        assert!(config.use_git);
        assert_eq!(config.remote_branch, "main");
        assert_eq!(config.logging.format.as_deref(), Some("json"));
        assert_eq!(config.logging.level, "info");
        Ok(())
    }

    #[test]
    fn environment_overrides_document() -> TestResult<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("quire.json");
        fs::write(&path, r#"{"use_git": true, "lock_timeout_ms": 100}"#)?;

        let config = load_with_env(
            Some(&path),
            env(&[
                (ENV_USE_GIT, "false"),
                (ENV_LOCK_TIMEOUT_MS, "250"),
                (ENV_GIT_SSH_COMMAND, "ssh -i /keys/deploy"),
                (ENV_LOCK_DIR, "/run/quire/locks"),
            ]),
        )?;
        assert!(!config.use_git);
        assert_eq!(config.lock_dir(), PathBuf::from("/run/quire/locks"));
        assert_eq!(config.lock_timeout_ms, 250);
        assert_eq!(
            config.git_env(),
            vec![(
                "GIT_SSH_COMMAND".to_string(),
                "ssh -i /keys/deploy".to_string()
            )]
        );
        Ok(())
    }

    #[test]
    fn unknown_document_fields_are_rejected() -> TestResult<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("quire.json");
        fs::write(&path, r#"{"use_svn": true}"#)?;

        let err = load_with_env(Some(&path), env(&[])).err();
        assert!(matches!(err, Some(ConfigError::Parse { .. })));
        Ok(())
    }

    #[test]
    fn missing_document_reports_io_error() {
        let err = load_with_env(Some(Path::new("/definitely/missing/quire.json")), env(&[])).err();
        assert!(matches!(
            err,
            Some(ConfigError::Io {
                operation: "config.read",
                ..
            })
        ));
    }

    #[test]
    fn malformed_override_fails_validation() {
        let err = load_with_env(None, env(&[(ENV_LOCK_TIMEOUT_MS, "0")])).err();
        assert!(matches!(
            err,
            Some(ConfigError::InvalidField {
                field: "lock_timeout_ms",
                ..
            })
        ));
    }
}
