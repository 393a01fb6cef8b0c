//! Argument parsing, error type and command dispatch for the `quire` binary.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use quire_runtime::SequenceId;
use tracing::{Instrument, info};
use uuid::Uuid;

use crate::commands::{edit, jobs};
use crate::context::AppContext;

/// Parses CLI arguments, executes the requested command and reports the
/// outcome. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let command_name = command_label(&cli.command);
    let trace_id = Uuid::new_v4();

    let result = match AppContext::from_globals(&cli.globals) {
        Ok(ctx) => {
            if let Err(err) = ctx.init_logging() {
                eprintln!("warning: {err:#}");
            }
            dispatch(cli.command, &ctx)
                .instrument(quire_telemetry::session_span(
                    command_name,
                    &trace_id.to_string(),
                ))
                .await
        }
        Err(err) => Err(err),
    };

    match result {
        Ok(()) => {
            info!(command = command_name, "command completed");
            0
        }
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(command: Command, ctx: &AppContext) -> CliResult<()> {
    match command {
        Command::Question(command) => edit::handle(ctx, edit::question(command, ctx)?).await,
        Command::Assessment(command) => edit::handle(ctx, edit::assessment(command)).await,
        Command::Instance(command) => edit::handle(ctx, edit::instance(command)).await,
        Command::File(command) => edit::handle(ctx, edit::file(command, ctx)?).await,
        Command::CourseInfo(command) => edit::handle(ctx, edit::course_info(command)).await,
        Command::Jobs(JobsCommand::Show(args)) => jobs::handle_show(ctx, args.sequence_id),
    }
}

#[derive(Parser)]
#[command(name = "quire", about = "Edit course content with locking, auditing and git")]
pub(crate) struct Cli {
    #[command(flatten)]
    pub(crate) globals: GlobalArgs,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Args, Clone, Debug)]
pub(crate) struct GlobalArgs {
    #[arg(
        long,
        global = true,
        env = "QUIRE_COURSE_DIR",
        default_value = ".",
        help = "Course checkout to edit"
    )]
    pub(crate) course: PathBuf,
    #[arg(long, global = true, env = "QUIRE_CONFIG", help = "JSON configuration file")]
    pub(crate) config: Option<PathBuf>,
    #[arg(long, global = true, help = "Wrap the edit in git clean/reset/commit/push")]
    pub(crate) use_git: bool,
    #[arg(long, global = true, env = "QUIRE_COURSE_ID", default_value = "local")]
    pub(crate) course_id: String,
    #[arg(long, global = true, env = "QUIRE_USER_NAME", default_value = "quire")]
    pub(crate) user_name: String,
    #[arg(long, global = true, env = "QUIRE_USER_EMAIL")]
    pub(crate) user_email: Option<String>,
    #[arg(
        long,
        global = true,
        help = "Directory holding persisted job sequences (overrides configuration)"
    )]
    pub(crate) job_log_dir: Option<PathBuf>,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format"
    )]
    pub(crate) output: OutputFormat,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    #[command(subcommand)]
    Question(QuestionCommand),
    #[command(subcommand)]
    Assessment(AssessmentCommand),
    #[command(subcommand)]
    Instance(InstanceCommand),
    #[command(subcommand)]
    File(FileCommand),
    #[command(subcommand)]
    CourseInfo(CourseInfoCommand),
    #[command(subcommand)]
    Jobs(JobsCommand),
}

#[derive(Subcommand)]
pub(crate) enum QuestionCommand {
    Add(QuestionAddArgs),
    Copy(QuestionArgs),
    Rename(QuestionRenameArgs),
    Delete(QuestionArgs),
    Transfer(QuestionTransferArgs),
}

#[derive(Args)]
pub(crate) struct QuestionAddArgs {
    #[arg(long, help = "Question template directory (defaults to the configured one)")]
    pub(crate) template: Option<PathBuf>,
}

#[derive(Args)]
pub(crate) struct QuestionArgs {
    #[arg(help = "Question id, e.g. topic/q1")]
    pub(crate) qid: String,
}

#[derive(Args)]
pub(crate) struct QuestionRenameArgs {
    pub(crate) qid: String,
    pub(crate) new_qid: String,
}

#[derive(Args)]
pub(crate) struct QuestionTransferArgs {
    #[arg(long = "from", help = "Root of the course holding the question")]
    pub(crate) from: PathBuf,
    #[arg(long, help = "Display name of the source course (defaults to its directory name)")]
    pub(crate) from_name: Option<String>,
    pub(crate) qid: String,
}

#[derive(Subcommand)]
pub(crate) enum AssessmentCommand {
    Add(InstanceScope),
    Copy(AssessmentArgs),
    Rename(AssessmentRenameArgs),
    Delete(AssessmentArgs),
}

#[derive(Args)]
pub(crate) struct InstanceScope {
    #[arg(long = "instance", help = "Course instance short name")]
    pub(crate) course_instance: String,
}

#[derive(Args)]
pub(crate) struct AssessmentArgs {
    #[command(flatten)]
    pub(crate) scope: InstanceScope,
    pub(crate) tid: String,
}

#[derive(Args)]
pub(crate) struct AssessmentRenameArgs {
    #[command(flatten)]
    pub(crate) scope: InstanceScope,
    pub(crate) tid: String,
    pub(crate) new_tid: String,
}

#[derive(Subcommand)]
pub(crate) enum InstanceCommand {
    Add,
    Copy(InstanceArgs),
    Rename(InstanceRenameArgs),
    Delete(InstanceArgs),
}

#[derive(Args)]
pub(crate) struct InstanceArgs {
    pub(crate) short_name: String,
}

#[derive(Args)]
pub(crate) struct InstanceRenameArgs {
    pub(crate) short_name: String,
    pub(crate) new_short_name: String,
}

#[derive(Subcommand)]
pub(crate) enum FileCommand {
    Delete(FileArgs),
    Rename(FileRenameArgs),
    Upload(FileUploadArgs),
}

#[derive(Args)]
pub(crate) struct ContainerArgs {
    #[arg(
        long,
        help = "Directory, relative to the course, that bounds the edit (defaults to the course root)"
    )]
    pub(crate) root: Option<PathBuf>,
}

#[derive(Args)]
pub(crate) struct FileArgs {
    #[command(flatten)]
    pub(crate) container: ContainerArgs,
    pub(crate) path: PathBuf,
}

#[derive(Args)]
pub(crate) struct FileRenameArgs {
    #[command(flatten)]
    pub(crate) container: ContainerArgs,
    pub(crate) old_path: PathBuf,
    pub(crate) new_path: PathBuf,
}

#[derive(Args)]
pub(crate) struct FileUploadArgs {
    #[command(flatten)]
    pub(crate) container: ContainerArgs,
    #[arg(long = "from", help = "Local file whose bytes are uploaded")]
    pub(crate) from: PathBuf,
    pub(crate) path: PathBuf,
}

#[derive(Subcommand)]
pub(crate) enum CourseInfoCommand {
    Create,
}

#[derive(Subcommand)]
pub(crate) enum JobsCommand {
    Show(JobsShowArgs),
}

#[derive(Args)]
pub(crate) struct JobsShowArgs {
    pub(crate) sequence_id: SequenceId,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// CLI-level error type to distinguish rejections from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

pub(crate) const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Question(QuestionCommand::Add(_)) => "question_add",
        Command::Question(QuestionCommand::Copy(_)) => "question_copy",
        Command::Question(QuestionCommand::Rename(_)) => "question_rename",
        Command::Question(QuestionCommand::Delete(_)) => "question_delete",
        Command::Question(QuestionCommand::Transfer(_)) => "question_transfer",
        Command::Assessment(AssessmentCommand::Add(_)) => "assessment_add",
        Command::Assessment(AssessmentCommand::Copy(_)) => "assessment_copy",
        Command::Assessment(AssessmentCommand::Rename(_)) => "assessment_rename",
        Command::Assessment(AssessmentCommand::Delete(_)) => "assessment_delete",
        Command::Instance(InstanceCommand::Add) => "instance_add",
        Command::Instance(InstanceCommand::Copy(_)) => "instance_copy",
        Command::Instance(InstanceCommand::Rename(_)) => "instance_rename",
        Command::Instance(InstanceCommand::Delete(_)) => "instance_delete",
        Command::File(FileCommand::Delete(_)) => "file_delete",
        Command::File(FileCommand::Rename(_)) => "file_rename",
        Command::File(FileCommand::Upload(_)) => "file_upload",
        Command::CourseInfo(CourseInfoCommand::Create) => "course_info_create",
        Command::Jobs(JobsCommand::Show(_)) => "jobs_show",
    }
}
