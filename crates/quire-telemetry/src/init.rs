//! Subscriber installation and the per-invocation root span.
//!
//! # Design
//! - A single registry carries the env filter plus exactly one of the JSON or
//!   human-readable layers; the unused one is `None`.
//! - `RUST_LOG` wins over the configured level.
//! - The build SHA is stored once and stamped on every [`session_span`], so
//!   each log line emitted inside a command carries it.

use anyhow::{Result, anyhow};
use once_cell::sync::OnceCell;
use tracing::{Span, info, info_span};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const UNKNOWN_BUILD: &str = "dev";

static BUILD_SHA: OnceCell<String> = OnceCell::new();

/// Install the global subscriber described by `config`.
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig<'_>) -> Result<()> {
    let _ = BUILD_SHA.set(config.build_sha.to_string());

    let (json, text) = match config.format {
        LogFormat::Json => (
            Some(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_target(true),
            ),
            None,
        ),
        LogFormat::Pretty => (None, Some(fmt::layer().compact().with_target(false))),
    };
    tracing_subscriber::registry()
        .with(env_filter(config.level))
        .with(json)
        .with(text)
        .try_init()
        .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))?;

    info!(
        build_sha = build_sha(),
        format = config.format.as_str(),
        level = config.level,
        "logging initialised"
    );
    Ok(())
}

/// Build SHA recorded by [`init_logging`], `dev` before initialisation.
#[must_use]
pub fn build_sha() -> &'static str {
    BUILD_SHA.get().map_or(UNKNOWN_BUILD, String::as_str)
}

/// Root span for one command invocation, tagged with the build SHA and a
/// caller-supplied trace id.
#[must_use]
pub fn session_span(command: &str, trace_id: &str) -> Span {
    info_span!(
        "session",
        command,
        trace_id,
        build_sha = build_sha()
    )
}

/// Inputs to [`init_logging`].
#[derive(Debug, Clone, Copy)]
pub struct LoggingConfig<'a> {
    /// Filter directive such as `info` or `quire_editor=debug`.
    pub level: &'a str,
    /// Output layer.
    pub format: LogFormat,
    /// Build identifier stamped on session spans.
    pub build_sha: &'a str,
}

/// Output layer selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event, including the enclosing span's fields.
    Json,
    /// Compact single-line text.
    Pretty,
}

impl LogFormat {
    /// Pretty for debug builds, JSON otherwise.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }

    /// Parse a configured format name; anything unrecognised is inferred.
    #[must_use]
    pub fn from_config(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("json") => Self::Json,
            Some(value) if value.eq_ignore_ascii_case("pretty") => Self::Pretty,
            _ => Self::infer(),
        }
    }

    /// Configuration spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
        }
    }
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}
