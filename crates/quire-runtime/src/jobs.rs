//! Job sequence recording.
//!
//! # Design
//! - A sequence is the audit trail of one edit; each pipeline step appends a job
//!   with a live log and a terminal status.
//! - [`JobRecorder`] is the seam the pipeline talks to; [`JobStore`] is the
//!   in-process implementation, optionally mirrored to `<dir>/<id>.json`.
//! - Job handles write through a [`JobSink`] so alternative recorders can reuse
//!   the handle type.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{RuntimeError, RuntimeResult};
use crate::process::{ProcessCommand, ProcessOutput, ProcessRunner};

const SEQUENCE_SUFFIX: &str = ".json";

/// Identifier of a recorded job sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceId(Uuid);

impl SequenceId {
    /// Allocate a fresh identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SequenceId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for SequenceId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for SequenceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

impl Display for SequenceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Overall state of a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceStatus {
    /// Jobs are still being appended.
    Running,
    /// The sequence finished with a successful final job.
    Success,
    /// The sequence was marked failed.
    Error,
}

impl SequenceStatus {
    /// Lowercase label used in logs and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Terminal or live state of a single job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// The job has not reported an outcome yet.
    Running,
    /// The job succeeded.
    Succeeded,
    /// The job failed.
    Failed,
}

impl JobStatus {
    /// Lowercase label used in logs and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

/// Metadata attached to a sequence when it is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceMeta {
    /// Course the sequence belongs to.
    pub course_id: String,
    /// Effective user performing the edit.
    pub user_id: String,
    /// Authenticated user; differs from `user_id` under impersonation.
    pub authn_user_id: String,
    /// Sequence kind, e.g. `edit`.
    pub kind: String,
    /// Human description of the sequence.
    pub description: String,
}

/// Specification for a job appended to a sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    /// Machine-readable job type, e.g. `git_push`.
    pub kind: String,
    /// Human description shown next to the job.
    pub description: String,
    /// Command line when the job runs a child process.
    pub command: Option<String>,
}

impl JobSpec {
    /// Build a spec without a command.
    #[must_use]
    pub fn new(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            description: description.into(),
            command: None,
        }
    }

    /// Attach a rendered command line.
    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }
}

/// Persisted record for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// One-based position within the sequence.
    pub number: usize,
    /// Machine-readable job type.
    pub kind: String,
    /// Human description.
    pub description: String,
    /// Command line for process jobs.
    pub command: Option<String>,
    /// Current status.
    pub status: JobStatus,
    /// Accumulated log text, one line per entry.
    pub log: String,
    /// Failure detail for failed jobs.
    pub error: Option<String>,
    /// Exit code for process jobs.
    pub exit_code: Option<i32>,
    /// Creation time.
    pub started_at: DateTime<Utc>,
    /// Completion time.
    pub finished_at: Option<DateTime<Utc>>,
}

/// Persisted record for one sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSequence {
    /// Sequence identifier.
    pub id: SequenceId,
    /// Creation metadata.
    pub meta: SequenceMeta,
    /// Overall status.
    pub status: SequenceStatus,
    /// Jobs in creation order.
    pub jobs: Vec<JobRecord>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time the sequence reached a terminal status.
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobSequence {
    /// First job of the given kind.
    #[must_use]
    pub fn job(&self, kind: &str) -> Option<&JobRecord> {
        self.jobs.iter().find(|job| job.kind == kind)
    }

    /// Job kinds in creation order.
    #[must_use]
    pub fn job_kinds(&self) -> Vec<&str> {
        self.jobs.iter().map(|job| job.kind.as_str()).collect()
    }
}

/// Outcome reported when a job completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobCompletion {
    /// The job succeeded.
    Succeeded,
    /// The job failed with the given detail.
    Failed {
        /// Rendered failure detail.
        error: String,
        /// Exit code for process jobs.
        exit_code: Option<i32>,
    },
}

/// Write side of a recorder, used by [`JobHandle`].
pub trait JobSink: Send + Sync {
    /// Append one log line to a running job.
    fn append_log(&self, sequence_id: SequenceId, job_number: usize, line: &str);

    /// Move a running job to a terminal status.
    ///
    /// # Errors
    ///
    /// Returns an error if the job is unknown, already finished, or cannot be persisted.
    fn complete_job(
        &self,
        sequence_id: SequenceId,
        job_number: usize,
        completion: JobCompletion,
    ) -> RuntimeResult<()>;
}

/// Handle to a live job.
#[derive(Clone)]
pub struct JobHandle {
    sink: Arc<dyn JobSink>,
    sequence_id: SequenceId,
    number: usize,
    kind: String,
}

impl JobHandle {
    /// Construct a handle writing through `sink`.
    #[must_use]
    pub fn new(
        sink: Arc<dyn JobSink>,
        sequence_id: SequenceId,
        number: usize,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            sink,
            sequence_id,
            number,
            kind: kind.into(),
        }
    }

    /// Sequence the job belongs to.
    #[must_use]
    pub const fn sequence_id(&self) -> SequenceId {
        self.sequence_id
    }

    /// One-based position within the sequence.
    #[must_use]
    pub const fn number(&self) -> usize {
        self.number
    }

    /// Job type.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Append a line to the job log.
    pub fn log(&self, line: impl AsRef<str>) {
        let line = line.as_ref();
        debug!(
            sequence_id = %self.sequence_id,
            job = %self.kind,
            line = line,
            "job log"
        );
        self.sink.append_log(self.sequence_id, self.number, line);
    }

    /// Mark the job as succeeded.
    ///
    /// # Errors
    ///
    /// Returns an error if the recorder rejects the transition.
    pub fn succeed(&self) -> RuntimeResult<()> {
        self.sink
            .complete_job(self.sequence_id, self.number, JobCompletion::Succeeded)
    }

    /// Mark the job as failed, recording `error` in the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the recorder rejects the transition.
    pub fn fail(&self, error: &str) -> RuntimeResult<()> {
        self.fail_with_exit(error, None)
    }

    /// Mark a process job as failed with its exit code.
    ///
    /// # Errors
    ///
    /// Returns an error if the recorder rejects the transition.
    pub fn fail_with_exit(&self, error: &str, exit_code: Option<i32>) -> RuntimeResult<()> {
        self.log(format!("Error: {error}"));
        self.sink.complete_job(
            self.sequence_id,
            self.number,
            JobCompletion::Failed {
                error: error.to_string(),
                exit_code,
            },
        )
    }
}

/// Recorder interface consumed by the edit pipeline.
#[async_trait]
pub trait JobRecorder: Send + Sync {
    /// Open a new sequence.
    async fn create_sequence(&self, meta: SequenceMeta) -> RuntimeResult<SequenceId>;

    /// Append a job to a running sequence.
    async fn create_job(&self, sequence_id: SequenceId, spec: JobSpec)
    -> RuntimeResult<JobHandle>;

    /// Mark a sequence as failed.
    async fn fail_sequence(&self, sequence_id: SequenceId) -> RuntimeResult<()>;

    /// Mark a sequence as successfully finished.
    async fn finish_sequence(&self, sequence_id: SequenceId) -> RuntimeResult<()>;

    /// Snapshot of a sequence.
    async fn sequence(&self, sequence_id: SequenceId) -> RuntimeResult<Option<JobSequence>>;

    /// Run `command` as a job: output is streamed into the job log and the exit
    /// status decides success or failure.
    ///
    /// A non-zero exit is reported through [`ProcessOutput::success`], not as an
    /// error; errors mean the process could not be run or supervised.
    async fn run_process_job(
        &self,
        sequence_id: SequenceId,
        spec: JobSpec,
        command: &ProcessCommand,
        runner: &dyn ProcessRunner,
    ) -> RuntimeResult<ProcessOutput> {
        let job = self
            .create_job(sequence_id, spec.with_command(command.display()))
            .await?;
        job.log(format!("$ {}", command.display()));
        match runner.run(command, &job).await {
            Ok(output) if output.success() => {
                job.succeed()?;
                Ok(output)
            }
            Ok(output) => {
                let detail = format!(
                    "{} exited with status {}",
                    command.program,
                    output
                        .code
                        .map_or_else(|| "signal".to_string(), |code| code.to_string())
                );
                job.fail_with_exit(&detail, output.code)?;
                Ok(output)
            }
            Err(err) => {
                if let Err(record_err) = job.fail(&err.to_string()) {
                    warn!(
                        error = %record_err,
                        sequence_id = %sequence_id,
                        "failed to record process job failure"
                    );
                }
                Err(err)
            }
        }
    }
}

/// In-process recorder, optionally mirrored to JSON files.
#[derive(Clone)]
pub struct JobStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    sequences: Mutex<HashMap<SequenceId, JobSequence>>,
    persist_dir: Option<PathBuf>,
}

impl JobStore {
    /// Recorder that keeps sequences in memory only.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                sequences: Mutex::new(HashMap::new()),
                persist_dir: None,
            }),
        }
    }

    /// Recorder that also writes each sequence to `<dir>/<id>.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn persistent(dir: impl Into<PathBuf>) -> RuntimeResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|source| RuntimeError::io("jobs.create_dir", &dir, source))?;
        Ok(Self {
            inner: Arc::new(StoreInner {
                sequences: Mutex::new(HashMap::new()),
                persist_dir: Some(dir),
            }),
        })
    }

    /// Read a sequence previously persisted under `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or malformed.
    pub fn load_persisted(dir: &Path, sequence_id: SequenceId) -> RuntimeResult<JobSequence> {
        let path = sequence_path(dir, sequence_id);
        let raw = fs::read_to_string(&path)
            .map_err(|source| RuntimeError::io("jobs.read", &path, source))?;
        serde_json::from_str(&raw).map_err(|source| RuntimeError::json("jobs.parse", &path, source))
    }

    /// Snapshot of every recorded sequence, oldest first.
    #[must_use]
    pub fn sequences(&self) -> Vec<JobSequence> {
        let mut all: Vec<JobSequence> = self.inner.lock().values().cloned().collect();
        all.sort_by_key(|sequence| sequence.created_at);
        all
    }

    fn sink(&self) -> Arc<dyn JobSink> {
        Arc::clone(&self.inner) as Arc<dyn JobSink>
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl StoreInner {
    fn lock(&self) -> MutexGuard<'_, HashMap<SequenceId, JobSequence>> {
        match self.sequences.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("job store mutex poisoned; continuing with recovered guard");
                poisoned.into_inner()
            }
        }
    }

    fn persist(&self, sequence: &JobSequence) -> RuntimeResult<()> {
        let Some(dir) = &self.persist_dir else {
            return Ok(());
        };
        let path = sequence_path(dir, sequence.id);
        let serialised = serde_json::to_string_pretty(sequence)
            .map_err(|source| RuntimeError::json("jobs.serialize", &path, source))?;
        fs::write(&path, serialised).map_err(|source| RuntimeError::io("jobs.write", &path, source))
    }

    fn update<F>(&self, sequence_id: SequenceId, op: F) -> RuntimeResult<()>
    where
        F: FnOnce(&mut JobSequence) -> RuntimeResult<()>,
    {
        let snapshot = {
            let mut sequences = self.lock();
            let sequence = sequences
                .get_mut(&sequence_id)
                .ok_or(RuntimeError::UnknownSequence { sequence_id })?;
            op(sequence)?;
            sequence.clone()
        };
        self.persist(&snapshot)
    }
}

impl JobSink for StoreInner {
    fn append_log(&self, sequence_id: SequenceId, job_number: usize, line: &str) {
        let mut sequences = self.lock();
        if let Some(job) = sequences
            .get_mut(&sequence_id)
            .and_then(|sequence| sequence.jobs.get_mut(job_number.wrapping_sub(1)))
        {
            job.log.push_str(line);
            job.log.push('\n');
        }
    }

    fn complete_job(
        &self,
        sequence_id: SequenceId,
        job_number: usize,
        completion: JobCompletion,
    ) -> RuntimeResult<()> {
        self.update(sequence_id, |sequence| {
            let job = sequence
                .jobs
                .get_mut(job_number.wrapping_sub(1))
                .ok_or(RuntimeError::UnknownJob {
                    sequence_id,
                    job_number,
                })?;
            if job.status != JobStatus::Running {
                return Err(RuntimeError::AlreadyFinished {
                    sequence_id,
                    job_number: Some(job_number),
                });
            }
            match completion {
                JobCompletion::Succeeded => job.status = JobStatus::Succeeded,
                JobCompletion::Failed { error, exit_code } => {
                    job.status = JobStatus::Failed;
                    job.error = Some(error);
                    job.exit_code = exit_code;
                }
            }
            job.finished_at = Some(Utc::now());
            Ok(())
        })
    }
}

#[async_trait]
impl JobRecorder for JobStore {
    async fn create_sequence(&self, meta: SequenceMeta) -> RuntimeResult<SequenceId> {
        let sequence = JobSequence {
            id: SequenceId::new(),
            meta,
            status: SequenceStatus::Running,
            jobs: Vec::new(),
            created_at: Utc::now(),
            finished_at: None,
        };
        let id = sequence.id;
        self.inner.lock().insert(id, sequence.clone());
        self.inner.persist(&sequence)?;
        Ok(id)
    }

    async fn create_job(
        &self,
        sequence_id: SequenceId,
        spec: JobSpec,
    ) -> RuntimeResult<JobHandle> {
        let mut number = 0;
        let kind = spec.kind.clone();
        self.inner.update(sequence_id, |sequence| {
            if sequence.status != SequenceStatus::Running {
                return Err(RuntimeError::AlreadyFinished {
                    sequence_id,
                    job_number: None,
                });
            }
            number = sequence.jobs.len() + 1;
            sequence.jobs.push(JobRecord {
                number,
                kind: spec.kind,
                description: spec.description,
                command: spec.command,
                status: JobStatus::Running,
                log: String::new(),
                error: None,
                exit_code: None,
                started_at: Utc::now(),
                finished_at: None,
            });
            Ok(())
        })?;
        Ok(JobHandle::new(self.sink(), sequence_id, number, kind))
    }

    async fn fail_sequence(&self, sequence_id: SequenceId) -> RuntimeResult<()> {
        self.inner.update(sequence_id, |sequence| {
            sequence.status = SequenceStatus::Error;
            sequence.finished_at = Some(Utc::now());
            Ok(())
        })
    }

    async fn finish_sequence(&self, sequence_id: SequenceId) -> RuntimeResult<()> {
        self.inner.update(sequence_id, |sequence| {
            if sequence.status != SequenceStatus::Running {
                return Err(RuntimeError::AlreadyFinished {
                    sequence_id,
                    job_number: None,
                });
            }
            sequence.status = SequenceStatus::Success;
            sequence.finished_at = Some(Utc::now());
            Ok(())
        })
    }

    async fn sequence(&self, sequence_id: SequenceId) -> RuntimeResult<Option<JobSequence>> {
        Ok(self.inner.lock().get(&sequence_id).cloned())
    }
}

fn sequence_path(dir: &Path, sequence_id: SequenceId) -> PathBuf {
    dir.join(format!("{sequence_id}{SEQUENCE_SUFFIX}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};

    type TestResult<T> = Result<T>;

    fn meta() -> SequenceMeta {
        SequenceMeta {
            course_id: "1".to_string(),
            user_id: "42".to_string(),
            authn_user_id: "7".to_string(),
            kind: "edit".to_string(),
            description: "copy question question-1".to_string(),
        }
    }

    async fn snapshot(store: &JobStore, id: SequenceId) -> TestResult<JobSequence> {
        store
            .sequence(id)
            .await?
            .ok_or_else(|| anyhow!("sequence {id} missing"))
    }

    #[tokio::test]
    async fn jobs_record_logs_and_status() -> TestResult<()> {
        let store = JobStore::in_memory();
        let id = store.create_sequence(meta()).await?;

        let lock = store.create_job(id, JobSpec::new("lock", "Lock")).await?;
        lock.log("Acquired lock");
        lock.succeed()?;

        let write = store
            .create_job(id, JobSpec::new("write", "Write to disk"))
            .await?;
        write.fail("template missing")?;
        store.fail_sequence(id).await?;

        let sequence = snapshot(&store, id).await?;
        assert_eq!(sequence.status, SequenceStatus::Error);
        assert_eq!(sequence.job_kinds(), vec!["lock", "write"]);
        let lock_record = sequence.job("lock").ok_or_else(|| anyhow!("lock job"))?;
        assert_eq!(lock_record.status, JobStatus::Succeeded);
        assert_eq!(lock_record.log, "Acquired lock\n");
        let write_record = sequence.job("write").ok_or_else(|| anyhow!("write job"))?;
        assert_eq!(write_record.status, JobStatus::Failed);
        assert_eq!(write_record.error.as_deref(), Some("template missing"));
        assert!(write_record.log.contains("Error: template missing"));
        Ok(())
    }

    #[tokio::test]
    async fn completing_a_job_twice_is_rejected() -> TestResult<()> {
        let store = JobStore::in_memory();
        let id = store.create_sequence(meta()).await?;
        let job = store.create_job(id, JobSpec::new("unlock", "Unlock")).await?;
        job.succeed()?;
        assert!(matches!(
            job.fail("late"),
            Err(RuntimeError::AlreadyFinished {
                job_number: Some(1),
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn finished_sequences_accept_no_more_jobs() -> TestResult<()> {
        let store = JobStore::in_memory();
        let id = store.create_sequence(meta()).await?;
        store.finish_sequence(id).await?;
        assert!(store.create_job(id, JobSpec::new("lock", "Lock")).await.is_err());
        assert_eq!(snapshot(&store, id).await?.status, SequenceStatus::Success);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_sequences_are_reported() {
        let store = JobStore::in_memory();
        let missing = SequenceId::new();
        assert!(matches!(
            store.fail_sequence(missing).await,
            Err(RuntimeError::UnknownSequence { .. })
        ));
    }

    #[tokio::test]
    async fn persistent_store_writes_sequence_files() -> TestResult<()> {
        let dir = tempfile::tempdir()?;
        let store = JobStore::persistent(dir.path().join("jobs"))?;
        let id = store.create_sequence(meta()).await?;
        let job = store
            .create_job(id, JobSpec::new("git_push", "Push to remote").with_command("git push"))
            .await?;
        job.log("Everything up-to-date");
        job.succeed()?;
        store.finish_sequence(id).await?;

        let loaded = JobStore::load_persisted(&dir.path().join("jobs"), id)?;
        assert_eq!(loaded.status, SequenceStatus::Success);
        assert_eq!(loaded.jobs[0].command.as_deref(), Some("git push"));
        assert_eq!(loaded.jobs[0].log, "Everything up-to-date\n");
        Ok(())
    }

    #[test]
    fn sequence_id_parses_from_string() -> TestResult<()> {
        let id = SequenceId::new();
        let parsed: SequenceId = id.to_string().parse()?;
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<SequenceId>().is_err());
        Ok(())
    }
}
