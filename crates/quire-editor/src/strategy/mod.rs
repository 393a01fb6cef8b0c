//! Content mutation strategies.
//!
//! # Design
//! - One strategy per operation kind; the pipeline is generic over
//!   [`EditStrategy`] and never inspects which one it runs.
//! - Strategies only touch the working tree. Staging, committing and
//!   publishing belong to the pipeline.
//! - Validation that needs no lock lives in [`EditStrategy::can_edit`] so a
//!   rejected request leaves no trace.

use std::path::PathBuf;

use quire_runtime::JobHandle;

use crate::error::{EditError, EditResult};
use crate::model::EditContext;
use crate::paths;

pub mod assessment;
pub mod course_info;
pub mod course_instance;
pub mod file;
pub mod question;

pub use assessment::{AssessmentAdd, AssessmentCopy, AssessmentDelete, AssessmentRename};
pub use course_info::CourseInfoCreate;
pub use course_instance::{InstanceAdd, InstanceCopy, InstanceDelete, InstanceRename};
pub use file::{FileDelete, FileRename, FileUpload};
pub use question::{QuestionAdd, QuestionCopy, QuestionDelete, QuestionRename, QuestionTransfer};

/// What a successful write changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Paths to stage, absolute or relative to the course root.
    pub changed_paths: Vec<PathBuf>,
    /// One-line summary, used as the commit message.
    pub summary: String,
    /// Identifier of a newly created entity.
    pub created_id: Option<String>,
    /// UUID assigned to a newly created entity.
    pub created_uuid: Option<String>,
}

impl WriteOutcome {
    /// Outcome touching `changed_paths`.
    #[must_use]
    pub fn new(summary: impl Into<String>, changed_paths: Vec<PathBuf>) -> Self {
        Self {
            changed_paths,
            summary: summary.into(),
            created_id: None,
            created_uuid: None,
        }
    }

    /// Attach the identity of a newly created entity.
    #[must_use]
    pub fn created(mut self, id: impl Into<String>, uuid: impl Into<String>) -> Self {
        self.created_id = Some(id.into());
        self.created_uuid = Some(uuid.into());
        self
    }
}

/// One kind of content mutation.
pub trait EditStrategy: Send + Sync {
    /// Human description used for the job sequence.
    fn describe(&self) -> String;

    /// Reject requests that must not run. Called before any lock is taken.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::InvalidIdentifier`] for unacceptable targets.
    fn can_edit(&self, _ctx: &EditContext) -> EditResult<()> {
        Ok(())
    }

    /// Whether the edit would change anything. Called after `can_edit`, before
    /// any lock is taken.
    ///
    /// # Errors
    ///
    /// Returns an error if the current state cannot be inspected.
    fn should_edit(&self, _ctx: &EditContext) -> EditResult<bool> {
        Ok(true)
    }

    /// Apply the mutation to the working tree.
    ///
    /// # Errors
    ///
    /// Returns an error when the tree cannot be changed as requested.
    fn write(&self, ctx: &EditContext, job: &JobHandle) -> EditResult<WriteOutcome>;
}

pub(crate) fn require_id(field: &'static str, id: &str) -> EditResult<()> {
    if paths::is_relative_id(id) {
        Ok(())
    } else {
        Err(EditError::invalid(field, id, "not_a_relative_id"))
    }
}

pub(crate) fn require_single_component(field: &'static str, name: &str) -> EditResult<()> {
    if paths::is_single_component(name) {
        Ok(())
    } else {
        Err(EditError::invalid(field, name, "not_a_single_component"))
    }
}
