//! Locked, audited execution of one content edit.
//!
//! # Design
//! - A single linear routine drives every strategy: lock, optionally sync to
//!   the remote, write, optionally stage/commit/push, unlock, then refresh the
//!   revision cache, the database mirror and the code cache.
//! - Every state opens a job in the sequence; version-control states run a
//!   child process whose exit status decides the job outcome.
//! - Once the lock is held it is released on every path; only an unlock
//!   failure itself leaves it to the lock manager.
//! - Failures before the change is durable fail the run. Failures after it are
//!   reported as post-commit warnings.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use quire_config::EditorConfig;
use quire_events::{Event, EventBus};
use quire_runtime::{
    InProcessLocks, JobHandle, JobRecorder, JobSpec, JobStore, LockManager, LockToken,
    ProcessCommand, ProcessOutput, ProcessRunner, SequenceId, SequenceMeta, TokioProcessRunner,
};
use quire_telemetry::Metrics;
use tracing::{debug, error, info, warn};

use crate::error::{EditError, EditResult};
use crate::model::EditContext;
use crate::operation::EditOperation;
use crate::paths;
use crate::report::{EditFailure, EditReport, EditStatus, PipelineState, PostCommitWarning, StepStatus};
use crate::strategy::{EditStrategy, WriteOutcome};
use crate::sync::{CodeCache, DescriptorAudit, DiskSynchronizer, MemoryRevisionStore, NullCodeCache, RevisionStore};
use crate::vcs::GitCommands;

const HEALTH_COMPONENT: &str = "edit_pipeline";
const SEQUENCE_KIND: &str = "edit";

/// Behaviour switches for the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Wrap each edit in clean/reset/stage/commit/push steps.
    pub use_git: bool,
    /// Remote branch used when resetting the working tree.
    pub remote_branch: String,
    /// Environment exported to version-control processes.
    pub git_env: Vec<(String, String)>,
    /// Maximum wait for the course lock.
    pub lock_timeout: Duration,
    /// Course that may never be edited.
    pub example_course_path: Option<PathBuf>,
}

impl PipelineSettings {
    /// Settings derived from the editor configuration.
    #[must_use]
    pub fn from_config(config: &EditorConfig) -> Self {
        Self {
            use_git: config.use_git,
            remote_branch: config.remote_branch.clone(),
            git_env: config.git_env(),
            lock_timeout: config.lock_timeout(),
            example_course_path: config.example_course_path.clone(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&EditorConfig::default())
    }
}

/// External services the pipeline drives.
#[derive(Clone)]
pub struct Collaborators {
    /// Course lock manager.
    pub locks: Arc<dyn LockManager>,
    /// Job sequence recorder.
    pub jobs: Arc<dyn JobRecorder>,
    /// Child process runner for version-control steps.
    pub runner: Arc<dyn ProcessRunner>,
    /// Database mirror refresh.
    pub synchronizer: Arc<dyn DiskSynchronizer>,
    /// Question server code cache.
    pub code_cache: Arc<dyn CodeCache>,
    /// Head revision store.
    pub revisions: Arc<dyn RevisionStore>,
}

impl Collaborators {
    /// In-process collaborators recording jobs into `jobs`.
    #[must_use]
    pub fn local(jobs: JobStore) -> Self {
        Self {
            locks: Arc::new(InProcessLocks::new()),
            jobs: Arc::new(jobs),
            runner: Arc::new(TokioProcessRunner),
            synchronizer: Arc::new(DescriptorAudit),
            code_cache: Arc::new(NullCodeCache),
            revisions: Arc::new(MemoryRevisionStore::new()),
        }
    }
}

/// Mutable bookkeeping of one run.
struct Run {
    course_id: String,
    sequence_id: SequenceId,
    report: EditReport,
}

impl Run {
    fn failed(&self) -> bool {
        self.report.failure.is_some()
    }
}

/// Executes edits under the course lock and records them as job sequences.
#[derive(Clone)]
pub struct EditPipeline {
    settings: PipelineSettings,
    collaborators: Collaborators,
    events: EventBus,
    metrics: Metrics,
    health_degraded: Arc<Mutex<bool>>,
}

impl EditPipeline {
    /// Construct a pipeline publishing to `events` and reporting to `metrics`.
    #[must_use]
    pub fn new(
        settings: PipelineSettings,
        collaborators: Collaborators,
        events: EventBus,
        metrics: Metrics,
    ) -> Self {
        Self {
            settings,
            collaborators,
            events,
            metrics,
            health_degraded: Arc::new(Mutex::new(false)),
        }
    }

    /// Active settings.
    #[must_use]
    pub const fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run `operation` against the course in `ctx`.
    ///
    /// # Errors
    ///
    /// See [`EditPipeline::run`].
    pub async fn apply(&self, ctx: &EditContext, operation: EditOperation) -> EditResult<EditReport> {
        self.run(ctx, operation.into_strategy()).await
    }

    /// Run `strategy` against the course in `ctx`.
    ///
    /// Rejections found before any lock is taken are returned as errors and
    /// leave no job sequence behind. Once a sequence exists every outcome,
    /// including failure, is returned as a report.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::PermissionDenied`] or
    /// [`EditError::InvalidIdentifier`] for rejected requests, an error from
    /// `should_edit` if the current state cannot be inspected, and
    /// [`EditError::Recorder`] if the job sequence cannot be opened.
    pub async fn run(&self, ctx: &EditContext, strategy: Box<dyn EditStrategy>) -> EditResult<EditReport> {
        let description = strategy.describe();
        self.guard(ctx)?;
        strategy.can_edit(ctx)?;

        if !strategy.should_edit(ctx)? {
            info!(
                course_id = %ctx.course.id,
                description = %description,
                "edit would not change anything; skipping"
            );
            self.metrics.inc_edit(EditStatus::Unchanged.as_str());
            self.publish_event(Event::EditSkipped {
                course_id: ctx.course.id.clone(),
                description: description.clone(),
            });
            let mut report = EditReport::new(None, description);
            report.status = EditStatus::Unchanged;
            return Ok(report);
        }

        let sequence_id = self
            .collaborators
            .jobs
            .create_sequence(SequenceMeta {
                course_id: ctx.course.id.clone(),
                user_id: ctx.actor.user_id.clone(),
                authn_user_id: ctx.actor.authn_user_id.clone(),
                kind: SEQUENCE_KIND.to_string(),
                description: description.clone(),
            })
            .await
            .map_err(|source| EditError::Recorder { source })?;

        info!(
            course_id = %ctx.course.id,
            sequence_id = %sequence_id,
            description = %description,
            "edit started"
        );
        self.publish_event(Event::EditStarted {
            course_id: ctx.course.id.clone(),
            sequence_id: sequence_id.as_uuid(),
            description: description.clone(),
        });

        let mut run = Run {
            course_id: ctx.course.id.clone(),
            sequence_id,
            report: EditReport::new(Some(sequence_id), description),
        };
        self.execute(ctx, strategy.as_ref(), &mut run).await;
        self.conclude(&mut run).await;
        Ok(run.report)
    }

    fn guard(&self, ctx: &EditContext) -> EditResult<()> {
        if !ctx.has_edit_permission {
            return Err(EditError::PermissionDenied {
                course_id: ctx.course.id.clone(),
                reason: "missing_edit_permission",
            });
        }
        let is_example = ctx.course.example_course
            || self
                .settings
                .example_course_path
                .as_deref()
                .is_some_and(|example| paths::normalize(example) == paths::normalize(ctx.course_path()));
        if is_example {
            return Err(EditError::PermissionDenied {
                course_id: ctx.course.id.clone(),
                reason: "example_course",
            });
        }
        Ok(())
    }

    async fn execute(&self, ctx: &EditContext, strategy: &dyn EditStrategy, run: &mut Run) {
        let token = match self.lock(ctx, run).await {
            Ok(token) => token,
            Err(err) => {
                Self::record_failure(run, PipelineState::Locking, &err);
                return;
            }
        };

        let git = self.settings.use_git.then(|| {
            GitCommands::new(
                ctx.course_path(),
                self.settings.remote_branch.clone(),
                self.settings.git_env.clone(),
            )
        });

        if let Some(git) = &git
            && let Err((state, err)) = self.sync_to_remote(run, git).await
        {
            Self::record_failure(run, state, &err);
        }

        if !run.failed() {
            match self.write(ctx, strategy, run).await {
                Ok(outcome) => {
                    if let Some(git) = &git {
                        self.version(ctx, run, git, &outcome).await;
                    }
                    run.report.summary = Some(outcome.summary);
                    run.report.changed_paths = outcome.changed_paths;
                    run.report.created_id = outcome.created_id;
                }
                Err(err) => {
                    Self::record_failure(run, PipelineState::Writing, &err);
                    if let Some(git) = &git {
                        self.discard(run, git).await;
                    }
                }
            }
        }

        if let Err(err) = self.unlock(ctx, run, token).await {
            Self::record_failure(run, PipelineState::Unlocking, &err);
            return;
        }
        if run.failed() {
            return;
        }

        self.refresh(ctx, run, git.as_ref()).await;
    }

    async fn lock(&self, ctx: &EditContext, run: &mut Run) -> EditResult<LockToken> {
        let state = PipelineState::Locking;
        let job = self.start(run, state).await?;
        let lock_name = ctx.course.lock_name();
        job.log(format!("Acquiring lock {lock_name}"));
        let started = Instant::now();
        let result = self
            .collaborators
            .locks
            .acquire(&lock_name, self.settings.lock_timeout)
            .await
            .map_err(|source| EditError::LockTimeout {
                course_path: ctx.course_path().to_path_buf(),
                source,
            });
        self.metrics.observe_lock_wait(started.elapsed());
        self.finish(run, state, &job, result)
    }

    async fn unlock(&self, ctx: &EditContext, run: &mut Run, token: LockToken) -> EditResult<()> {
        let state = PipelineState::Unlocking;
        let job = match self.start(run, state).await {
            Ok(job) => job,
            Err(err) => {
                // Without a job the lock must still go.
                if let Err(release_err) = self.collaborators.locks.release(token).await {
                    error!(error = %release_err, "failed to release course lock");
                }
                return Err(err);
            }
        };
        job.log(format!("Releasing lock {}", token.name()));
        let result = self
            .collaborators
            .locks
            .release(token)
            .await
            .map_err(|source| EditError::UnlockFailure {
                course_path: ctx.course_path().to_path_buf(),
                source,
            });
        self.finish(run, state, &job, result)
    }

    async fn sync_to_remote(
        &self,
        run: &mut Run,
        git: &GitCommands,
    ) -> Result<(), (PipelineState, EditError)> {
        self.git_step(run, PipelineState::Cleaning, &git.clean())
            .await
            .map_err(|err| (PipelineState::Cleaning, err))?;
        self.git_step(run, PipelineState::Resetting, &git.reset_to_remote())
            .await
            .map_err(|err| (PipelineState::Resetting, err))?;
        Ok(())
    }

    async fn write(
        &self,
        ctx: &EditContext,
        strategy: &dyn EditStrategy,
        run: &mut Run,
    ) -> EditResult<WriteOutcome> {
        let state = PipelineState::Writing;
        let job = self.start(run, state).await?;
        let result = strategy.write(ctx, &job).and_then(|outcome| {
            if outcome.summary.trim().is_empty() {
                return Err(EditError::mutation(
                    "write.summary",
                    ctx.course_path(),
                    "empty_summary",
                ));
            }
            if outcome.changed_paths.is_empty() {
                return Err(EditError::mutation(
                    "write.paths",
                    ctx.course_path(),
                    "no_changed_paths",
                ));
            }
            Ok(outcome)
        });
        self.finish(run, state, &job, result)
    }

    async fn version(&self, ctx: &EditContext, run: &mut Run, git: &GitCommands, outcome: &WriteOutcome) {
        let staged = match self
            .git_step(run, PipelineState::Staging, &git.add(&outcome.changed_paths))
            .await
        {
            Ok(_) => {
                self.git_step(
                    run,
                    PipelineState::Committing,
                    &git.commit(&ctx.actor, &outcome.summary),
                )
                .await
                .map_err(|err| (PipelineState::Committing, err))
            }
            Err(err) => Err((PipelineState::Staging, err)),
        };
        if let Err((state, err)) = staged {
            Self::record_failure(run, state, &err);
            self.discard(run, git).await;
            return;
        }

        if let Err(err) = self.git_step(run, PipelineState::Publishing, &git.push()).await {
            Self::record_failure(run, PipelineState::Publishing, &err);
            if let Err(rollback_err) = self
                .git_step(run, PipelineState::RollingBack, &git.rollback())
                .await
            {
                Self::record_failure(run, PipelineState::RollingBack, &rollback_err);
            }
        }
    }

    async fn discard(&self, run: &mut Run, git: &GitCommands) {
        if let Err((state, err)) = self.sync_to_remote(run, git).await {
            Self::record_failure(run, state, &err);
        }
    }

    async fn refresh(&self, ctx: &EditContext, run: &mut Run, git: Option<&GitCommands>) {
        match git {
            Some(git) => {
                let state = PipelineState::UpdatingRevisionCache;
                let result = self.update_revision(ctx, run, git).await;
                if let Err(err) = result {
                    Self::record_warning(run, state, &err);
                }
            }
            None => {
                let state = PipelineState::UpdatingRevisionCache;
                self.begin(run, state);
                self.settle(
                    run,
                    state,
                    StepStatus::Skipped,
                    Some("version control disabled".to_string()),
                );
            }
        }

        let state = PipelineState::Resynchronizing;
        if let Err(err) = self.resync(ctx, run).await {
            Self::record_warning(run, state, &err);
        }

        let state = PipelineState::InvalidatingCache;
        if let Err(err) = self.invalidate(ctx, run).await {
            Self::record_warning(run, state, &err);
        }
    }

    async fn update_revision(&self, ctx: &EditContext, run: &mut Run, git: &GitCommands) -> EditResult<()> {
        let state = PipelineState::UpdatingRevisionCache;
        self.begin(run, state);
        let output = self.run_git(run, state, &git.rev_parse_head()).await;
        let result = match output {
            Ok(output) => {
                let hash = output.stdout.trim().to_string();
                let recorded = self
                    .collaborators
                    .revisions
                    .record(&ctx.course.id, &hash)
                    .await;
                if recorded.is_ok() {
                    ctx.course.set_commit_hash(hash.clone());
                    run.report.commit_hash = Some(hash);
                }
                recorded
            }
            Err(err) => Err(err),
        };
        self.settle_result(run, state, &result);
        result
    }

    async fn resync(&self, ctx: &EditContext, run: &mut Run) -> EditResult<()> {
        let state = PipelineState::Resynchronizing;
        let job = self.start(run, state).await?;
        let result = self
            .collaborators
            .synchronizer
            .resync(ctx.course_path(), &ctx.course.id, &job)
            .await;
        self.finish(run, state, &job, result)
    }

    async fn invalidate(&self, ctx: &EditContext, run: &mut Run) -> EditResult<()> {
        let state = PipelineState::InvalidatingCache;
        let job = self.start(run, state).await?;
        let result = self
            .collaborators
            .code_cache
            .invalidate(ctx.course_path(), &job)
            .await;
        self.finish(run, state, &job, result)
    }

    async fn conclude(&self, run: &mut Run) {
        let jobs = &self.collaborators.jobs;
        if let Some(failure) = run.report.failure.clone() {
            run.report.status = EditStatus::Failed;
            if let Err(err) = jobs.fail_sequence(run.sequence_id).await {
                warn!(
                    error = %err,
                    sequence_id = %run.sequence_id,
                    "failed to mark job sequence as failed"
                );
            }
            self.metrics.inc_edit(EditStatus::Failed.as_str());
            self.mark_degraded(&failure.message);
            self.publish_event(Event::EditFailed {
                course_id: run.course_id.clone(),
                sequence_id: run.sequence_id.as_uuid(),
                message: failure.message,
            });
            return;
        }

        let state = PipelineState::Finishing;
        let finished = match self.start(run, state).await {
            Ok(job) => {
                let result = jobs
                    .finish_sequence(run.sequence_id)
                    .await
                    .map_err(|source| EditError::Recorder { source });
                self.settle_result(run, state, &result);
                if let Err(err) = &result {
                    // The sequence refused to close; the job is still open.
                    if let Err(record_err) = job.fail(&err.detail()) {
                        debug!(error = %record_err, "finish job could not be failed");
                    }
                }
                result
            }
            Err(err) => Err(err),
        };
        if let Err(err) = finished {
            Self::record_warning(run, state, &err);
        }

        run.report.status = EditStatus::Succeeded;
        self.metrics.inc_edit(EditStatus::Succeeded.as_str());
        self.mark_recovered();
        info!(
            course_id = %run.course_id,
            sequence_id = %run.sequence_id,
            warnings = run.report.warnings.len(),
            "edit completed"
        );
        self.publish_event(Event::EditCompleted {
            course_id: run.course_id.clone(),
            sequence_id: run.sequence_id.as_uuid(),
        });
    }

    async fn git_step(
        &self,
        run: &mut Run,
        state: PipelineState,
        command: &ProcessCommand,
    ) -> EditResult<ProcessOutput> {
        self.begin(run, state);
        let result = self.run_git(run, state, command).await;
        self.settle_result(run, state, &result);
        result
    }

    async fn run_git(
        &self,
        run: &Run,
        state: PipelineState,
        command: &ProcessCommand,
    ) -> EditResult<ProcessOutput> {
        let step = state.job_kind();
        let output = self
            .collaborators
            .jobs
            .run_process_job(
                run.sequence_id,
                JobSpec::new(step, state.job_description()),
                command,
                self.collaborators.runner.as_ref(),
            )
            .await
            .map_err(|source| EditError::Process { step, source })?;
        if output.success() {
            Ok(output)
        } else {
            Err(EditError::VersioningFailure {
                step,
                exit_code: output.code,
            })
        }
    }

    async fn start(&self, run: &mut Run, state: PipelineState) -> EditResult<JobHandle> {
        self.begin(run, state);
        let created = self
            .collaborators
            .jobs
            .create_job(
                run.sequence_id,
                JobSpec::new(state.job_kind(), state.job_description()),
            )
            .await
            .map_err(|source| EditError::Recorder { source });
        if let Err(err) = &created {
            self.settle(run, state, StepStatus::Failed, Some(err.detail()));
        }
        created
    }

    fn finish<T>(
        &self,
        run: &mut Run,
        state: PipelineState,
        job: &JobHandle,
        result: EditResult<T>,
    ) -> EditResult<T> {
        let result = match result {
            Ok(value) => job
                .succeed()
                .map(|()| value)
                .map_err(|source| EditError::Recorder { source }),
            Err(err) => {
                if let Err(record_err) = job.fail(&err.detail()) {
                    warn!(
                        error = %record_err,
                        sequence_id = %run.sequence_id,
                        step = state.job_kind(),
                        "failed to record job failure"
                    );
                }
                Err(err)
            }
        };
        self.settle_result(run, state, &result);
        result
    }

    fn begin(&self, run: &mut Run, state: PipelineState) {
        debug!(
            course_id = %run.course_id,
            sequence_id = %run.sequence_id,
            state = state.as_str(),
            "edit state entered"
        );
        self.publish_event(Event::EditProgress {
            course_id: run.course_id.clone(),
            sequence_id: run.sequence_id.as_uuid(),
            step: state.job_kind().to_string(),
        });
        run.report.enter(state);
        self.metrics
            .inc_edit_step(state.as_str(), StepStatus::Started.as_str());
    }

    fn settle_result<T>(&self, run: &mut Run, state: PipelineState, result: &EditResult<T>) {
        match result {
            Ok(_) => self.settle(run, state, StepStatus::Completed, None),
            Err(err) => self.settle(run, state, StepStatus::Failed, Some(err.detail())),
        }
    }

    fn settle(&self, run: &mut Run, state: PipelineState, status: StepStatus, detail: Option<String>) {
        run.report.settle(state, status, detail);
        self.metrics.inc_edit_step(state.as_str(), status.as_str());
    }

    fn record_failure(run: &mut Run, state: PipelineState, err: &EditError) {
        let message = err.detail();
        error!(
            course_id = %run.course_id,
            sequence_id = %run.sequence_id,
            state = state.as_str(),
            kind = err.kind().as_str(),
            error = %message,
            "edit state failed"
        );
        if run.report.failure.is_none() {
            run.report.failure = Some(EditFailure {
                kind: err.kind(),
                state,
                message,
            });
        }
    }

    fn record_warning(run: &mut Run, state: PipelineState, err: &EditError) {
        let warning = EditError::PostCommitFailure {
            step: state.job_kind(),
            detail: err.detail(),
        };
        let message = warning.detail();
        warn!(
            course_id = %run.course_id,
            sequence_id = %run.sequence_id,
            state = state.as_str(),
            error = %message,
            "post-commit step failed"
        );
        run.report.warnings.push(PostCommitWarning { state, message });
    }

    fn publish_event(&self, event: Event) {
        self.metrics.inc_event(event.kind());
        let id = self.events.publish(event);
        debug!(event_id = id, "event published");
    }

    fn mark_degraded(&self, detail: &str) {
        let mut guard = self.lock_health_flag();
        if *guard {
            drop(guard);
            warn!(
                component = HEALTH_COMPONENT,
                detail = detail,
                "edit pipeline still degraded"
            );
        } else {
            *guard = true;
            drop(guard);
            warn!(
                component = HEALTH_COMPONENT,
                detail = detail,
                "edit pipeline degraded"
            );
            self.publish_event(Event::HealthChanged {
                degraded: vec![HEALTH_COMPONENT.to_string()],
            });
        }
    }

    fn mark_recovered(&self) {
        let mut guard = self.lock_health_flag();
        if std::mem::take(&mut *guard) {
            drop(guard);
            self.publish_event(Event::HealthChanged { degraded: vec![] });
            info!(component = HEALTH_COMPONENT, "edit pipeline recovered");
        }
    }

    fn lock_health_flag(&self) -> MutexGuard<'_, bool> {
        match self.health_degraded.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("edit pipeline health mutex poisoned; continuing with recovered guard");
                poisoned.into_inner()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Actor, CourseHandle};
    use crate::strategy::QuestionCopy;
    use anyhow::Result;
    use quire_test_support::CourseFixture;

    type TestResult<T> = Result<T>;

    fn context(course: &std::path::Path) -> EditContext {
        EditContext {
            actor: Actor {
                user_id: "1".to_string(),
                authn_user_id: "1".to_string(),
                name: "Dev".to_string(),
                uid: "dev@example.com".to_string(),
                email: None,
            },
            course: CourseHandle::new("7", course, "TEST 101"),
            has_edit_permission: true,
        }
    }

    fn pipeline(store: &JobStore, settings: PipelineSettings) -> TestResult<EditPipeline> {
        Ok(EditPipeline::new(
            settings,
            Collaborators::local(store.clone()),
            EventBus::new(),
            Metrics::new()?,
        ))
    }

    #[tokio::test]
    async fn local_copy_runs_every_state_without_git() -> TestResult<()> {
        let fixture = CourseFixture::new()?;
        fixture.add_question("q1", "u1", "One")?;
        let store = JobStore::in_memory();
        let pipeline = pipeline(&store, PipelineSettings::default())?;

        let report = pipeline
            .run(
                &context(fixture.path()),
                Box::new(QuestionCopy {
                    qid: "q1".to_string(),
                }),
            )
            .await?;

        assert_eq!(report.status, EditStatus::Succeeded);
        assert_eq!(report.summary.as_deref(), Some("copy question q1 to question-1"));
        assert_eq!(
            report.visited(),
            vec![
                PipelineState::Locking,
                PipelineState::Writing,
                PipelineState::Unlocking,
                PipelineState::UpdatingRevisionCache,
                PipelineState::Resynchronizing,
                PipelineState::InvalidatingCache,
                PipelineState::Finishing,
            ]
        );
        assert_eq!(
            report.state_status(PipelineState::UpdatingRevisionCache),
            Some(StepStatus::Skipped)
        );

        let sequence_id = report
            .sequence_id
            .ok_or_else(|| anyhow::anyhow!("missing sequence"))?;
        let sequence = store
            .sequence(sequence_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("sequence not recorded"))?;
        assert_eq!(
            sequence.job_kinds(),
            vec![
                "lock",
                "write",
                "unlock",
                "sync_from_disk",
                "reload_question_servers",
                "finish"
            ]
        );
        assert_eq!(sequence.meta.kind, "edit");
        assert_eq!(sequence.meta.description, "Copy question q1");
        Ok(())
    }

    #[tokio::test]
    async fn example_course_is_rejected_before_locking() -> TestResult<()> {
        let fixture = CourseFixture::new()?;
        let store = JobStore::in_memory();
        let settings = PipelineSettings {
            example_course_path: Some(fixture.path().to_path_buf()),
            ..PipelineSettings::default()
        };
        let pipeline = pipeline(&store, settings)?;

        let err = pipeline
            .run(
                &context(fixture.path()),
                Box::new(QuestionCopy {
                    qid: "q1".to_string(),
                }),
            )
            .await
            .err();
        assert!(matches!(
            err,
            Some(EditError::PermissionDenied {
                reason: "example_course",
                ..
            })
        ));
        assert!(store.sequences().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn failed_write_marks_sequence_failed_and_degrades_health() -> TestResult<()> {
        let fixture = CourseFixture::new()?;
        let store = JobStore::in_memory();
        let events = EventBus::new();
        let pipeline = EditPipeline::new(
            PipelineSettings::default(),
            Collaborators::local(store.clone()),
            events.clone(),
            Metrics::new()?,
        );

        let report = pipeline
            .run(
                &context(fixture.path()),
                Box::new(QuestionCopy {
                    qid: "missing".to_string(),
                }),
            )
            .await?;

        assert_eq!(report.status, EditStatus::Failed);
        let failure = report
            .failure
            .clone()
            .ok_or_else(|| anyhow::anyhow!("failure missing"))?;
        assert_eq!(failure.state, PipelineState::Writing);
        assert_eq!(report.state_status(PipelineState::Unlocking), Some(StepStatus::Completed));
        assert!(!report.visited().contains(&PipelineState::Resynchronizing));

        let kinds: Vec<&str> = events.backlog().iter().map(|envelope| envelope.event.kind()).collect();
        assert!(kinds.contains(&"edit_failed"));
        assert!(kinds.contains(&"health_changed"));
        Ok(())
    }
}
