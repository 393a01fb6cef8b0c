//! Child process execution with output streamed into a job log.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::error::{RuntimeError, RuntimeResult};
use crate::jobs::JobHandle;

/// A program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    /// Executable name or path.
    pub program: String,
    /// Arguments, passed without shell interpretation.
    pub args: Vec<String>,
    /// Working directory.
    pub working_dir: Option<PathBuf>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
}

impl ProcessCommand {
    /// Start building an invocation of `program`.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: Vec::new(),
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run from `dir`.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add environment variables.
    #[must_use]
    pub fn envs<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.env.extend(vars);
        self
    }

    /// Command line rendered for logs.
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessOutput {
    /// Exit code; absent when the process was terminated by a signal.
    pub code: Option<i32>,
    /// Collected standard output.
    pub stdout: String,
    /// Collected standard error.
    pub stderr: String,
}

impl ProcessOutput {
    /// Whether the process exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Executes commands on behalf of a job.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `command`, streaming its output lines into `job`.
    async fn run(&self, command: &ProcessCommand, job: &JobHandle) -> RuntimeResult<ProcessOutput>;
}

/// Runner that spawns real child processes with tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, command: &ProcessCommand, job: &JobHandle) -> RuntimeResult<ProcessOutput> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(command.env.iter().map(|(key, value)| (key.as_str(), value.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| RuntimeError::Spawn {
            program: command.program.clone(),
            source,
        })?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (stdout, stderr, status) = tokio::join!(
            pump(stdout, job),
            pump(stderr, job),
            child.wait()
        );
        let io_error = |source| RuntimeError::ProcessIo {
            program: command.program.clone(),
            source,
        };
        let status = status.map_err(io_error)?;
        let output = ProcessOutput {
            code: status.code(),
            stdout: stdout.map_err(io_error)?,
            stderr: stderr.map_err(io_error)?,
        };
        debug!(
            program = %command.program,
            code = ?output.code,
            "process finished"
        );
        Ok(output)
    }
}

async fn pump<R>(stream: Option<R>, job: &JobHandle) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut collected = String::new();
    let Some(stream) = stream else {
        return Ok(collected);
    };
    let mut lines = BufReader::new(stream).lines();
    while let Some(line) = lines.next_line().await? {
        job.log(&line);
        collected.push_str(&line);
        collected.push('\n');
    }
    Ok(collected)
}
