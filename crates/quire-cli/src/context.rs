//! Configuration, actor and pipeline wiring shared by every command.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use quire_config::EditorConfig;
use quire_editor::{Actor, Collaborators, CourseHandle, EditContext, EditPipeline, PipelineSettings};
use quire_events::EventBus;
use quire_runtime::{FileLocks, JobStore};
use quire_telemetry::{LogFormat, LoggingConfig, Metrics, init_logging};

use crate::cli::{CliError, CliResult, GlobalArgs, OutputFormat};

const CLI_USER_ID: &str = "cli";

/// Everything a command needs, resolved once from flags and configuration.
pub(crate) struct AppContext {
    pub(crate) config: EditorConfig,
    pub(crate) course: PathBuf,
    pub(crate) course_id: String,
    pub(crate) actor: Actor,
    pub(crate) job_log_dir: Option<PathBuf>,
    pub(crate) output: OutputFormat,
}

impl AppContext {
    /// Load configuration and apply flag overrides.
    pub(crate) fn from_globals(globals: &GlobalArgs) -> CliResult<Self> {
        let mut config = quire_config::load(globals.config.as_deref())
            .map_err(|err| CliError::failure(anyhow!(err).context("failed to load configuration")))?;
        if globals.use_git {
            config.use_git = true;
        }
        Ok(Self::with_config(config, globals))
    }

    pub(crate) fn with_config(config: EditorConfig, globals: &GlobalArgs) -> Self {
        let email = globals.user_email.clone();
        let uid = email.clone().unwrap_or_else(|| globals.user_name.clone());
        Self {
            job_log_dir: globals
                .job_log_dir
                .clone()
                .or_else(|| config.job_log_dir.clone()),
            config,
            course: globals.course.clone(),
            course_id: globals.course_id.clone(),
            actor: Actor {
                user_id: CLI_USER_ID.to_string(),
                authn_user_id: CLI_USER_ID.to_string(),
                name: globals.user_name.clone(),
                uid,
                email,
            },
            output: globals.output,
        }
    }

    /// Install the tracing subscriber described by the configuration.
    pub(crate) fn init_logging(&self) -> anyhow::Result<()> {
        init_logging(&LoggingConfig {
            level: &self.config.logging.level,
            format: LogFormat::from_config(self.config.logging.format.as_deref()),
            build_sha: option_env!("QUIRE_BUILD_SHA").unwrap_or("dev"),
        })
    }

    /// Absolute course root; the directory must exist.
    pub(crate) fn course_root(&self) -> CliResult<PathBuf> {
        fs::canonicalize(&self.course).map_err(|err| {
            CliError::validation(format!(
                "course directory {} is not accessible: {err}",
                self.course.display()
            ))
        })
    }

    /// Request context for an edit of the course.
    pub(crate) fn edit_context(&self) -> CliResult<EditContext> {
        let root = self.course_root()?;
        let short_name = short_name(&root);
        Ok(EditContext {
            actor: self.actor.clone(),
            course: CourseHandle::new(self.course_id.clone(), root, short_name),
            has_edit_permission: true,
        })
    }

    /// Pipeline with local collaborators, recording into the configured job
    /// log directory when there is one. The course lock is a lock file so
    /// concurrent `quire` processes on one course serialize.
    pub(crate) fn pipeline(&self) -> CliResult<EditPipeline> {
        let store = match &self.job_log_dir {
            Some(dir) => JobStore::persistent(dir)
                .with_context(|| format!("failed to open job log directory {}", dir.display()))
                .map_err(CliError::failure)?,
            None => JobStore::in_memory(),
        };
        let mut collaborators = Collaborators::local(store);
        collaborators.locks = Arc::new(FileLocks::new(self.config.lock_dir()));
        let metrics = Metrics::new().map_err(CliError::failure)?;
        Ok(EditPipeline::new(
            PipelineSettings::from_config(&self.config),
            collaborators,
            EventBus::new(),
            metrics,
        ))
    }
}

fn short_name(root: &Path) -> String {
    root.file_name()
        .map_or_else(|| root.display().to_string(), |name| name.to_string_lossy().into_owned())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::Path;

    use quire_config::EditorConfig;

    use super::AppContext;
    use crate::cli::{GlobalArgs, OutputFormat};

    pub(crate) fn context(course: &Path, job_log_dir: Option<&Path>) -> AppContext {
        let globals = GlobalArgs {
            course: course.to_path_buf(),
            config: None,
            use_git: false,
            course_id: "7".to_string(),
            user_name: "Dev Instructor".to_string(),
            user_email: None,
            job_log_dir: job_log_dir.map(Path::to_path_buf),
            output: OutputFormat::Json,
        };
        AppContext::with_config(EditorConfig::default(), &globals)
    }
}
