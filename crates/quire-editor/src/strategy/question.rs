//! Question add, copy, transfer, rename and delete.

use std::path::PathBuf;

use quire_runtime::JobHandle;
use tracing::{info, warn};

use super::{EditStrategy, WriteOutcome, require_id, require_single_component};
use crate::descriptor;
use crate::error::{EditError, EditResult};
use crate::model::EditContext;
use crate::names;
use crate::tree::{self, AssessmentLocation, QUESTION_DESCRIPTOR};

const COPY_PREFIX: &str = "question-";
const COPY_TITLE: &str = "Replace this title";
const UNTITLED: &str = "Empty Title";

/// Add a new question from a template directory.
#[derive(Debug, Clone)]
pub struct QuestionAdd {
    /// Question directory copied as the starting point.
    pub template_dir: PathBuf,
}

impl EditStrategy for QuestionAdd {
    fn describe(&self) -> String {
        "Add question".to_string()
    }

    fn write(&self, ctx: &EditContext, job: &JobHandle) -> EditResult<WriteOutcome> {
        let root = tree::questions_root(ctx.course_path());
        let shorts = tree::taken_ids(&root, QUESTION_DESCRIPTOR)?;
        let longs = tree::existing_titles(&root, QUESTION_DESCRIPTOR, "title")?;
        let names = names::add_names(&shorts, &longs);
        let destination = root.join(tree::id_path(&names.short));

        job.log(format!(
            "Copy template from {} to {}",
            self.template_dir.display(),
            destination.display()
        ));
        tree::copy_tree(&self.template_dir, &destination)?;
        let uuid = descriptor::restamp(&destination.join(QUESTION_DESCRIPTOR), "title", &names.long)?;

        Ok(
            WriteOutcome::new(format!("add question {}", names.short), vec![destination])
                .created(names.short, uuid),
        )
    }
}

/// Copy a question within its course under the next `question-N` id.
#[derive(Debug, Clone)]
pub struct QuestionCopy {
    /// Question being copied.
    pub qid: String,
}

impl EditStrategy for QuestionCopy {
    fn describe(&self) -> String {
        format!("Copy question {}", self.qid)
    }

    fn can_edit(&self, _ctx: &EditContext) -> EditResult<()> {
        require_id("qid", &self.qid)
    }

    fn write(&self, ctx: &EditContext, job: &JobHandle) -> EditResult<WriteOutcome> {
        let root = tree::questions_root(ctx.course_path());
        let shorts = tree::taken_ids(&root, QUESTION_DESCRIPTOR)?;
        let qid = names::next_numeric(COPY_PREFIX, &shorts);
        let source = root.join(tree::id_path(&self.qid));
        let destination = root.join(tree::id_path(&qid));

        job.log(format!(
            "Copy question from {} to {}",
            source.display(),
            destination.display()
        ));
        tree::copy_tree(&source, &destination)?;
        let uuid = descriptor::restamp(&destination.join(QUESTION_DESCRIPTOR), "title", COPY_TITLE)?;

        Ok(WriteOutcome::new(
            format!("copy question {} to {qid}", self.qid),
            vec![destination],
        )
        .created(qid, uuid))
    }
}

/// Copy a question in from another course.
#[derive(Debug, Clone)]
pub struct QuestionTransfer {
    /// Directory of the source question.
    pub source_path: PathBuf,
    /// Identifier of the question in its course.
    pub source_qid: String,
    /// Short name of the source course.
    pub source_course: String,
}

impl EditStrategy for QuestionTransfer {
    fn describe(&self) -> String {
        format!(
            "Copy question {} from course {}",
            self.source_qid, self.source_course
        )
    }

    fn can_edit(&self, _ctx: &EditContext) -> EditResult<()> {
        require_id("source_qid", &self.source_qid)
    }

    fn write(&self, ctx: &EditContext, job: &JobHandle) -> EditResult<WriteOutcome> {
        let source_info = descriptor::read(&self.source_path.join(QUESTION_DESCRIPTOR))?;
        let source_title = descriptor::string_field(&source_info, "title")
            .filter(|title| !title.is_empty())
            .unwrap_or(UNTITLED)
            .to_string();

        let root = tree::questions_root(ctx.course_path());
        let shorts = tree::taken_ids(&root, QUESTION_DESCRIPTOR)?;
        let longs = tree::existing_titles(&root, QUESTION_DESCRIPTOR, "title")?;
        let collides = shorts.iter().any(|id| id == &self.source_qid)
            || longs.iter().any(|title| title == &source_title);
        let (qid, title) = if collides {
            let pair = names::copy_names(&self.source_qid, &shorts, Some(&source_title), &longs);
            (pair.short, pair.long)
        } else {
            (self.source_qid.clone(), source_title)
        };
        let destination = root.join(tree::id_path(&qid));

        job.log(format!(
            "Copy question from {} to {}",
            self.source_path.display(),
            destination.display()
        ));
        tree::copy_tree(&self.source_path, &destination)?;
        let uuid = descriptor::restamp(&destination.join(QUESTION_DESCRIPTOR), "title", &title)?;

        Ok(WriteOutcome::new(
            format!(
                "copy question {} (from course {}) to {qid}",
                self.source_qid, self.source_course
            ),
            vec![destination],
        )
        .created(qid, uuid))
    }
}

/// Rename a question and rewrite the assessments that reference it.
#[derive(Debug, Clone)]
pub struct QuestionRename {
    /// Current identifier.
    pub qid: String,
    /// New identifier; a single path component.
    pub new_qid: String,
    /// Assessments known to reference the question. When absent every
    /// assessment in the course is scanned.
    pub expected_references: Option<Vec<AssessmentLocation>>,
}

impl EditStrategy for QuestionRename {
    fn describe(&self) -> String {
        format!("Rename question {}", self.qid)
    }

    fn can_edit(&self, _ctx: &EditContext) -> EditResult<()> {
        require_id("qid", &self.qid)?;
        require_single_component("new_qid", &self.new_qid)
    }

    fn write(&self, ctx: &EditContext, job: &JobHandle) -> EditResult<WriteOutcome> {
        let course = ctx.course_path();
        let root = tree::questions_root(course);
        let old_path = root.join(tree::id_path(&self.qid));
        let new_path = root.join(&self.new_qid);

        job.log(format!(
            "Move files from {} to {}",
            old_path.display(),
            new_path.display()
        ));
        tree::move_path(&old_path, &new_path)?;
        tree::remove_empty_preceding_subfolders(&root, &self.qid)?;

        let mut changed = vec![old_path, new_path];
        let (targets, expected) = match &self.expected_references {
            Some(locations) => (locations.clone(), true),
            None => (tree::all_assessments(course)?, false),
        };
        for location in targets {
            let info_path = location.descriptor_path(course);
            let mut document = descriptor::read(&info_path)?;
            let found = descriptor::replace_question_id(&mut document, &self.qid, &self.new_qid);
            if !found {
                if expected {
                    job.log(format!(
                        "Should have but did not find {} in {}",
                        self.qid,
                        info_path.display()
                    ));
                    warn!(
                        qid = %self.qid,
                        path = %info_path.display(),
                        "expected question reference not found"
                    );
                } else {
                    continue;
                }
            }
            descriptor::write(&info_path, &document)?;
            info!(
                qid = %self.qid,
                new_qid = %self.new_qid,
                assessment = %location.tid,
                "rewrote question reference"
            );
            changed.push(info_path);
        }

        Ok(WriteOutcome::new(
            format!("rename question {} to {}", self.qid, self.new_qid),
            changed,
        ))
    }
}

/// Delete a question.
#[derive(Debug, Clone)]
pub struct QuestionDelete {
    /// Question being deleted.
    pub qid: String,
}

impl EditStrategy for QuestionDelete {
    fn describe(&self) -> String {
        format!("Delete question {}", self.qid)
    }

    fn can_edit(&self, _ctx: &EditContext) -> EditResult<()> {
        require_id("qid", &self.qid)
    }

    fn write(&self, ctx: &EditContext, job: &JobHandle) -> EditResult<WriteOutcome> {
        let root = tree::questions_root(ctx.course_path());
        let path = root.join(tree::id_path(&self.qid));
        if !path.exists() {
            return Err(EditError::mutation("question.delete", path, "missing"));
        }
        job.log(format!("Remove {}", path.display()));
        tree::remove_path(&path)?;
        tree::remove_empty_preceding_subfolders(&root, &self.qid)?;
        Ok(WriteOutcome::new(
            format!("delete question {}", self.qid),
            vec![path],
        ))
    }
}
