//! Assessment add, copy, rename and delete within one course instance.

use quire_runtime::JobHandle;
use serde_json::json;

use super::{EditStrategy, WriteOutcome, require_id, require_single_component};
use crate::descriptor;
use crate::error::{EditError, EditResult};
use crate::model::EditContext;
use crate::names;
use crate::tree::{self, ASSESSMENT_DESCRIPTOR};

/// Add an empty homework assessment.
#[derive(Debug, Clone)]
pub struct AssessmentAdd {
    /// Course instance receiving the assessment.
    pub course_instance: String,
}

impl EditStrategy for AssessmentAdd {
    fn describe(&self) -> String {
        format!("{}: add assessment", self.course_instance)
    }

    fn can_edit(&self, _ctx: &EditContext) -> EditResult<()> {
        require_id("course_instance", &self.course_instance)
    }

    fn write(&self, ctx: &EditContext, job: &JobHandle) -> EditResult<WriteOutcome> {
        let root = tree::assessments_root(ctx.course_path(), &self.course_instance);
        let shorts = tree::taken_ids(&root, ASSESSMENT_DESCRIPTOR)?;
        let longs = tree::existing_titles(&root, ASSESSMENT_DESCRIPTOR, "title")?;
        let names = names::add_names(&shorts, &longs);
        let assessment_path = root.join(tree::id_path(&names.short));
        if assessment_path.exists() {
            return Err(EditError::mutation(
                "assessment.add",
                assessment_path,
                "already_exists",
            ));
        }

        let uuid = descriptor::new_uuid();
        let document = json!({
            "uuid": uuid,
            "type": "Homework",
            "title": names.long,
            "set": "Homework",
            "number": "1",
            "allowAccess": [],
            "zones": [],
        });
        job.log(format!("Write {}", assessment_path.display()));
        descriptor::create(&assessment_path.join(ASSESSMENT_DESCRIPTOR), &document)?;

        Ok(WriteOutcome::new(
            format!("{}: add assessment {}", self.course_instance, names.short),
            vec![assessment_path],
        )
        .created(names.short, uuid))
    }
}

/// Copy an assessment under a `_copyN` name.
#[derive(Debug, Clone)]
pub struct AssessmentCopy {
    /// Course instance holding the assessment.
    pub course_instance: String,
    /// Assessment being copied.
    pub tid: String,
}

impl EditStrategy for AssessmentCopy {
    fn describe(&self) -> String {
        format!("{}: copy assessment {}", self.course_instance, self.tid)
    }

    fn can_edit(&self, _ctx: &EditContext) -> EditResult<()> {
        require_id("course_instance", &self.course_instance)?;
        require_id("tid", &self.tid)
    }

    fn write(&self, ctx: &EditContext, job: &JobHandle) -> EditResult<WriteOutcome> {
        let root = tree::assessments_root(ctx.course_path(), &self.course_instance);
        let source = root.join(tree::id_path(&self.tid));
        let source_info = descriptor::read(&source.join(ASSESSMENT_DESCRIPTOR))?;
        let shorts = tree::taken_ids(&root, ASSESSMENT_DESCRIPTOR)?;
        let longs = tree::existing_titles(&root, ASSESSMENT_DESCRIPTOR, "title")?;
        let names = names::copy_names(
            &self.tid,
            &shorts,
            descriptor::string_field(&source_info, "title"),
            &longs,
        );
        let destination = root.join(tree::id_path(&names.short));

        job.log(format!(
            "Copy assessment from {} to {}",
            source.display(),
            destination.display()
        ));
        tree::copy_tree(&source, &destination)?;
        let uuid = descriptor::restamp(
            &destination.join(ASSESSMENT_DESCRIPTOR),
            "title",
            &names.long,
        )?;

        Ok(WriteOutcome::new(
            format!(
                "{}: copy assessment {} to {}",
                self.course_instance, self.tid, names.short
            ),
            vec![destination],
        )
        .created(names.short, uuid))
    }
}

/// Rename an assessment directory.
#[derive(Debug, Clone)]
pub struct AssessmentRename {
    /// Course instance holding the assessment.
    pub course_instance: String,
    /// Current identifier.
    pub tid: String,
    /// New identifier; a single path component.
    pub new_tid: String,
}

impl EditStrategy for AssessmentRename {
    fn describe(&self) -> String {
        format!("{}: rename assessment {}", self.course_instance, self.tid)
    }

    fn can_edit(&self, _ctx: &EditContext) -> EditResult<()> {
        require_id("course_instance", &self.course_instance)?;
        require_id("tid", &self.tid)?;
        require_single_component("new_tid", &self.new_tid)
    }

    fn write(&self, ctx: &EditContext, job: &JobHandle) -> EditResult<WriteOutcome> {
        let root = tree::assessments_root(ctx.course_path(), &self.course_instance);
        let old_path = root.join(tree::id_path(&self.tid));
        let new_path = root.join(&self.new_tid);
        job.log(format!(
            "Move files from {} to {}",
            old_path.display(),
            new_path.display()
        ));
        tree::move_path(&old_path, &new_path)?;
        tree::remove_empty_preceding_subfolders(&root, &self.tid)?;
        Ok(WriteOutcome::new(
            format!(
                "{}: rename assessment {} to {}",
                self.course_instance, self.tid, self.new_tid
            ),
            vec![old_path, new_path],
        ))
    }
}

/// Delete an assessment directory.
#[derive(Debug, Clone)]
pub struct AssessmentDelete {
    /// Course instance holding the assessment.
    pub course_instance: String,
    /// Assessment being deleted.
    pub tid: String,
}

impl EditStrategy for AssessmentDelete {
    fn describe(&self) -> String {
        format!("{}: delete assessment {}", self.course_instance, self.tid)
    }

    fn can_edit(&self, _ctx: &EditContext) -> EditResult<()> {
        require_id("course_instance", &self.course_instance)?;
        require_id("tid", &self.tid)
    }

    fn write(&self, ctx: &EditContext, job: &JobHandle) -> EditResult<WriteOutcome> {
        let root = tree::assessments_root(ctx.course_path(), &self.course_instance);
        let path = root.join(tree::id_path(&self.tid));
        if !path.exists() {
            return Err(EditError::mutation("assessment.delete", path, "missing"));
        }
        job.log(format!("Remove {}", path.display()));
        tree::remove_path(&path)?;
        tree::remove_empty_preceding_subfolders(&root, &self.tid)?;
        Ok(WriteOutcome::new(
            format!("{}: delete assessment {}", self.course_instance, self.tid),
            vec![path],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::testing::{context, job};
    use anyhow::Result;
    use quire_test_support::CourseFixture;

    type TestResult<T> = Result<T>;

    fn fixture() -> TestResult<CourseFixture> {
        let fixture = CourseFixture::new()?;
        fixture.add_instance("Fa23", "ci", "Fall 2023")?;
        fixture.add_assessment("Fa23", "HW1", "a1", "Homework 1", &["q1"])?;
        Ok(fixture)
    }

    #[tokio::test]
    async fn add_writes_homework_skeleton() -> TestResult<()> {
        let fixture = fixture()?;
        let (_store, job) = job().await?;
        let outcome = AssessmentAdd {
            course_instance: "Fa23".to_string(),
        }
        .write(&context(fixture.path()), &job)?;

        assert_eq!(outcome.summary, "Fa23: add assessment New_1");
        let info = fixture.read_json("courseInstances/Fa23/assessments/New_1/infoAssessment.json")?;
        assert_eq!(info["type"], "Homework");
        assert_eq!(info["title"], "New (1)");
        assert_eq!(info["number"], "1");
        assert_eq!(info["zones"], json!([]));
        let keys: Vec<&str> = info
            .as_object()
            .map(|object| object.keys().map(String::as_str).collect())
            .unwrap_or_default();
        assert_eq!(
            keys,
            vec!["uuid", "type", "title", "set", "number", "allowAccess", "zones"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn copy_uses_copy_suffix_names() -> TestResult<()> {
        let fixture = fixture()?;
        fixture.add_assessment("Fa23", "HW1_copy1", "a2", "Homework 1 (copy 1)", &[])?;
        let (_store, job) = job().await?;
        let outcome = AssessmentCopy {
            course_instance: "Fa23".to_string(),
            tid: "HW1".to_string(),
        }
        .write(&context(fixture.path()), &job)?;

        assert_eq!(outcome.summary, "Fa23: copy assessment HW1 to HW1_copy2");
        let info =
            fixture.read_json("courseInstances/Fa23/assessments/HW1_copy2/infoAssessment.json")?;
        assert_eq!(info["title"], "Homework 1 (copy 2)");
        assert_ne!(info["uuid"], "a1");
        assert_eq!(info["zones"][0]["questions"][0]["id"], "q1");
        Ok(())
    }

    #[tokio::test]
    async fn rename_and_delete_move_directories() -> TestResult<()> {
        let fixture = fixture()?;
        let (_store, job) = job().await?;
        let ctx = context(fixture.path());

        let renamed = AssessmentRename {
            course_instance: "Fa23".to_string(),
            tid: "HW1".to_string(),
            new_tid: "Homework1".to_string(),
        }
        .write(&ctx, &job)?;
        assert_eq!(renamed.summary, "Fa23: rename assessment HW1 to Homework1");

        let deleted = AssessmentDelete {
            course_instance: "Fa23".to_string(),
            tid: "Homework1".to_string(),
        }
        .write(&ctx, &job)?;
        assert_eq!(deleted.summary, "Fa23: delete assessment Homework1");
        assert!(!fixture.path().join("courseInstances/Fa23/assessments/Homework1").exists());
        Ok(())
    }

    #[test]
    fn rename_validates_target() {
        let ctx = context(std::path::Path::new("/srv/course"));
        let strategy = AssessmentRename {
            course_instance: "Fa23".to_string(),
            tid: "HW1".to_string(),
            new_tid: "../HW9".to_string(),
        };
        assert!(strategy.can_edit(&ctx).is_err());
        let escape = AssessmentDelete {
            course_instance: "../other".to_string(),
            tid: "HW1".to_string(),
        };
        assert!(escape.can_edit(&ctx).is_err());
    }
}
