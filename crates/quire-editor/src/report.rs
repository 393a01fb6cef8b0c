//! Outcome of one pipeline run as seen by callers.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use quire_runtime::SequenceId;
use serde::{Deserialize, Serialize};

use crate::error::FailureKind;

/// Steps of the edit pipeline, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Acquire the course lock.
    Locking,
    /// Remove untracked files from the working tree.
    Cleaning,
    /// Hard-reset the working tree to the remote branch.
    Resetting,
    /// Apply the strategy's mutation.
    Writing,
    /// Stage the changed paths.
    Staging,
    /// Record a commit.
    Committing,
    /// Push the commit to the remote.
    Publishing,
    /// Undo the local commit after a failed push.
    RollingBack,
    /// Release the course lock.
    Unlocking,
    /// Record the new head revision.
    UpdatingRevisionCache,
    /// Re-read the course tree into the database mirror.
    Resynchronizing,
    /// Invalidate cached question server code.
    InvalidatingCache,
    /// Close the job sequence.
    Finishing,
}

impl PipelineState {
    /// Lowercase state name used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Locking => "locking",
            Self::Cleaning => "cleaning",
            Self::Resetting => "resetting",
            Self::Writing => "writing",
            Self::Staging => "staging",
            Self::Committing => "committing",
            Self::Publishing => "publishing",
            Self::RollingBack => "rolling_back",
            Self::Unlocking => "unlocking",
            Self::UpdatingRevisionCache => "updating_revision_cache",
            Self::Resynchronizing => "resynchronizing",
            Self::InvalidatingCache => "invalidating_cache",
            Self::Finishing => "finishing",
        }
    }

    /// Job type recorded for this state.
    #[must_use]
    pub const fn job_kind(self) -> &'static str {
        match self {
            Self::Locking => "lock",
            Self::Cleaning => "clean_git_repo",
            Self::Resetting => "reset_from_git",
            Self::Writing => "write",
            Self::Staging => "git_add",
            Self::Committing => "git_commit",
            Self::Publishing => "git_push",
            Self::RollingBack => "git_reset",
            Self::Unlocking => "unlock",
            Self::UpdatingRevisionCache => "update_commit_hash",
            Self::Resynchronizing => "sync_from_disk",
            Self::InvalidatingCache => "reload_question_servers",
            Self::Finishing => "finish",
        }
    }

    /// Job description recorded for this state.
    #[must_use]
    pub const fn job_description(self) -> &'static str {
        match self {
            Self::Locking => "Lock",
            Self::Cleaning => "Clean local files not in remote git repository",
            Self::Resetting => "Reset state to remote git repository",
            Self::Writing => "Write to disk",
            Self::Staging => "Stage changes",
            Self::Committing => "Commit changes",
            Self::Publishing => "Push to remote",
            Self::RollingBack => "Roll back commit",
            Self::Unlocking => "Unlock",
            Self::UpdatingRevisionCache => "Update commit hash",
            Self::Resynchronizing => "Sync course",
            Self::InvalidatingCache => "Reload question server code",
            Self::Finishing => "Finish job sequence",
        }
    }
}

/// Progress of one state within a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The state is executing.
    Started,
    /// The state finished successfully.
    Completed,
    /// The state failed.
    Failed,
    /// The state did not apply to this run.
    Skipped,
}

impl StepStatus {
    /// Lowercase label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// One visit to a pipeline state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    /// State visited.
    pub state: PipelineState,
    /// Latest status of the visit.
    pub status: StepStatus,
    /// Failure or skip detail.
    pub detail: Option<String>,
    /// When the status was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Terminal status of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditStatus {
    /// The mutation is durable.
    Succeeded,
    /// The run failed; see [`EditReport::failure`].
    Failed,
    /// The edit would not change anything and was not attempted.
    Unchanged,
}

impl EditStatus {
    /// Lowercase label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Unchanged => "unchanged",
        }
    }
}

/// The failure that decided a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditFailure {
    /// Failure category.
    pub kind: FailureKind,
    /// State that failed.
    pub state: PipelineState,
    /// Rendered failure detail.
    pub message: String,
}

/// Failure of a step after the mutation became durable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCommitWarning {
    /// State that failed.
    pub state: PipelineState,
    /// Rendered failure detail.
    pub message: String,
}

/// Everything a caller learns about one edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditReport {
    /// Job sequence, absent when the edit was skipped before one was opened.
    pub sequence_id: Option<SequenceId>,
    /// Strategy description.
    pub description: String,
    /// Terminal status.
    pub status: EditStatus,
    /// First failure of a failed run.
    pub failure: Option<EditFailure>,
    /// Post-commit failures of an otherwise successful run.
    pub warnings: Vec<PostCommitWarning>,
    /// Every state visited, in order.
    pub states: Vec<StateRecord>,
    /// Commit summary produced by the write step.
    pub summary: Option<String>,
    /// Paths the write step changed.
    pub changed_paths: Vec<PathBuf>,
    /// Identifier of a newly created entity.
    pub created_id: Option<String>,
    /// Head revision after the edit, when version control is enabled.
    pub commit_hash: Option<String>,
}

impl EditReport {
    pub(crate) fn new(sequence_id: Option<SequenceId>, description: String) -> Self {
        Self {
            sequence_id,
            description,
            status: EditStatus::Failed,
            failure: None,
            warnings: Vec::new(),
            states: Vec::new(),
            summary: None,
            changed_paths: Vec::new(),
            created_id: None,
            commit_hash: None,
        }
    }

    /// Whether the run made its mutation durable.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == EditStatus::Succeeded
    }

    /// Final status of the last visit to `state`.
    #[must_use]
    pub fn state_status(&self, state: PipelineState) -> Option<StepStatus> {
        self.states
            .iter()
            .rev()
            .find(|record| record.state == state)
            .map(|record| record.status)
    }

    /// Visited states in order.
    #[must_use]
    pub fn visited(&self) -> Vec<PipelineState> {
        self.states.iter().map(|record| record.state).collect()
    }

    pub(crate) fn enter(&mut self, state: PipelineState) {
        self.states.push(StateRecord {
            state,
            status: StepStatus::Started,
            detail: None,
            updated_at: Utc::now(),
        });
    }

    pub(crate) fn settle(&mut self, state: PipelineState, status: StepStatus, detail: Option<String>) {
        if let Some(record) = self
            .states
            .iter_mut()
            .rev()
            .find(|record| record.state == state)
        {
            record.status = status;
            record.detail = detail;
            record.updated_at = Utc::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_metadata_matches_audit_vocabulary() {
        assert_eq!(PipelineState::Cleaning.job_kind(), "clean_git_repo");
        assert_eq!(
            PipelineState::Resetting.job_description(),
            "Reset state to remote git repository"
        );
        assert_eq!(PipelineState::InvalidatingCache.job_kind(), "reload_question_servers");
        assert_eq!(PipelineState::Finishing.job_description(), "Finish job sequence");
    }

    #[test]
    fn settle_updates_latest_visit() {
        let mut report = EditReport::new(None, "Copy question q1".to_string());
        report.enter(PipelineState::Cleaning);
        report.settle(PipelineState::Cleaning, StepStatus::Completed, None);
        report.enter(PipelineState::Cleaning);
        report.settle(
            PipelineState::Cleaning,
            StepStatus::Failed,
            Some("exit 1".to_string()),
        );

        assert_eq!(report.states.len(), 2);
        assert_eq!(report.states[0].status, StepStatus::Completed);
        assert_eq!(
            report.state_status(PipelineState::Cleaning),
            Some(StepStatus::Failed)
        );
        assert_eq!(report.visited(), vec![PipelineState::Cleaning; 2]);
    }

    #[test]
    fn report_serializes_snake_case() -> anyhow::Result<()> {
        let mut report = EditReport::new(None, "Add question".to_string());
        report.status = EditStatus::Unchanged;
        let value = serde_json::to_value(&report)?;
        assert_eq!(value["status"], "unchanged");
        assert!(value["sequence_id"].is_null());
        Ok(())
    }
}
