//! Closed set of edit requests accepted by the pipeline.

use crate::strategy::{
    AssessmentAdd, AssessmentCopy, AssessmentDelete, AssessmentRename, CourseInfoCreate,
    EditStrategy, FileDelete, FileRename, FileUpload, InstanceAdd, InstanceCopy, InstanceDelete,
    InstanceRename, QuestionAdd, QuestionCopy, QuestionDelete, QuestionRename, QuestionTransfer,
};

/// One requested edit, carrying its operation-specific parameters.
#[derive(Debug, Clone)]
pub enum EditOperation {
    /// Add a question from the template.
    QuestionAdd(QuestionAdd),
    /// Copy a question within the course.
    QuestionCopy(QuestionCopy),
    /// Copy a question in from another course.
    QuestionTransfer(QuestionTransfer),
    /// Rename a question and rewrite references to it.
    QuestionRename(QuestionRename),
    /// Delete a question.
    QuestionDelete(QuestionDelete),
    /// Add an assessment.
    AssessmentAdd(AssessmentAdd),
    /// Copy an assessment.
    AssessmentCopy(AssessmentCopy),
    /// Rename an assessment.
    AssessmentRename(AssessmentRename),
    /// Delete an assessment.
    AssessmentDelete(AssessmentDelete),
    /// Add a course instance.
    InstanceAdd(InstanceAdd),
    /// Copy a course instance.
    InstanceCopy(InstanceCopy),
    /// Rename a course instance.
    InstanceRename(InstanceRename),
    /// Delete a course instance.
    InstanceDelete(InstanceDelete),
    /// Delete a file.
    FileDelete(FileDelete),
    /// Rename a file.
    FileRename(FileRename),
    /// Upload a file.
    FileUpload(FileUpload),
    /// Create a missing course descriptor.
    CourseInfoCreate(CourseInfoCreate),
}

impl EditOperation {
    /// Machine-readable operation name.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::QuestionAdd(_) => "question_add",
            Self::QuestionCopy(_) => "question_copy",
            Self::QuestionTransfer(_) => "question_transfer",
            Self::QuestionRename(_) => "question_rename",
            Self::QuestionDelete(_) => "question_delete",
            Self::AssessmentAdd(_) => "assessment_add",
            Self::AssessmentCopy(_) => "assessment_copy",
            Self::AssessmentRename(_) => "assessment_rename",
            Self::AssessmentDelete(_) => "assessment_delete",
            Self::InstanceAdd(_) => "instance_add",
            Self::InstanceCopy(_) => "instance_copy",
            Self::InstanceRename(_) => "instance_rename",
            Self::InstanceDelete(_) => "instance_delete",
            Self::FileDelete(_) => "file_delete",
            Self::FileRename(_) => "file_rename",
            Self::FileUpload(_) => "file_upload",
            Self::CourseInfoCreate(_) => "course_info_create",
        }
    }

    /// Strategy executing this operation.
    #[must_use]
    pub fn into_strategy(self) -> Box<dyn EditStrategy> {
        match self {
            Self::QuestionAdd(strategy) => Box::new(strategy),
            Self::QuestionCopy(strategy) => Box::new(strategy),
            Self::QuestionTransfer(strategy) => Box::new(strategy),
            Self::QuestionRename(strategy) => Box::new(strategy),
            Self::QuestionDelete(strategy) => Box::new(strategy),
            Self::AssessmentAdd(strategy) => Box::new(strategy),
            Self::AssessmentCopy(strategy) => Box::new(strategy),
            Self::AssessmentRename(strategy) => Box::new(strategy),
            Self::AssessmentDelete(strategy) => Box::new(strategy),
            Self::InstanceAdd(strategy) => Box::new(strategy),
            Self::InstanceCopy(strategy) => Box::new(strategy),
            Self::InstanceRename(strategy) => Box::new(strategy),
            Self::InstanceDelete(strategy) => Box::new(strategy),
            Self::FileDelete(strategy) => Box::new(strategy),
            Self::FileRename(strategy) => Box::new(strategy),
            Self::FileUpload(strategy) => Box::new(strategy),
            Self::CourseInfoCreate(strategy) => Box::new(strategy),
        }
    }
}
