//! Course instance add, copy, rename and delete.

use quire_runtime::JobHandle;
use serde_json::json;

use super::{EditStrategy, WriteOutcome, require_id, require_single_component};
use crate::descriptor;
use crate::error::{EditError, EditResult};
use crate::model::EditContext;
use crate::names;
use crate::tree::{self, INSTANCE_DESCRIPTOR};

/// Add an empty course instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstanceAdd;

impl EditStrategy for InstanceAdd {
    fn describe(&self) -> String {
        "Add course instance".to_string()
    }

    fn write(&self, ctx: &EditContext, job: &JobHandle) -> EditResult<WriteOutcome> {
        let root = tree::instances_root(ctx.course_path());
        let shorts = tree::taken_ids(&root, INSTANCE_DESCRIPTOR)?;
        let longs = tree::existing_titles(&root, INSTANCE_DESCRIPTOR, "longName")?;
        let names = names::add_names(&shorts, &longs);
        let instance_path = root.join(tree::id_path(&names.short));
        if instance_path.exists() {
            return Err(EditError::mutation(
                "instance.add",
                instance_path,
                "already_exists",
            ));
        }

        let uuid = descriptor::new_uuid();
        job.log(format!("Write {}", instance_path.display()));
        descriptor::create(
            &instance_path.join(INSTANCE_DESCRIPTOR),
            &json!({
                "uuid": uuid,
                "longName": names.long,
                "allowAccess": [],
            }),
        )?;

        Ok(WriteOutcome::new(
            format!("add course instance {}", names.short),
            vec![instance_path],
        )
        .created(names.short, uuid))
    }
}

/// Copy a course instance into the next academic term.
#[derive(Debug, Clone)]
pub struct InstanceCopy {
    /// Course instance being copied.
    pub short_name: String,
}

impl EditStrategy for InstanceCopy {
    fn describe(&self) -> String {
        format!("Copy course instance {}", self.short_name)
    }

    fn can_edit(&self, _ctx: &EditContext) -> EditResult<()> {
        require_id("short_name", &self.short_name)
    }

    fn write(&self, ctx: &EditContext, job: &JobHandle) -> EditResult<WriteOutcome> {
        let root = tree::instances_root(ctx.course_path());
        let shorts = tree::taken_ids(&root, INSTANCE_DESCRIPTOR)?;
        let short_name = names::next_term(&self.short_name, &shorts);
        let long_name = format!("Replace this long name ({short_name})");
        let source = root.join(tree::id_path(&self.short_name));
        let destination = root.join(tree::id_path(&short_name));

        job.log(format!(
            "Copy course instance from {} to {}",
            source.display(),
            destination.display()
        ));
        tree::copy_tree(&source, &destination)?;
        let uuid = descriptor::restamp(
            &destination.join(INSTANCE_DESCRIPTOR),
            "longName",
            &long_name,
        )?;

        Ok(WriteOutcome::new(
            format!("copy course instance {} to {short_name}", self.short_name),
            vec![destination],
        )
        .created(short_name, uuid))
    }
}

/// Rename a course instance directory.
#[derive(Debug, Clone)]
pub struct InstanceRename {
    /// Current short name.
    pub short_name: String,
    /// New short name; a single path component.
    pub new_short_name: String,
}

impl EditStrategy for InstanceRename {
    fn describe(&self) -> String {
        format!("Rename course instance {}", self.short_name)
    }

    fn can_edit(&self, _ctx: &EditContext) -> EditResult<()> {
        require_id("short_name", &self.short_name)?;
        require_single_component("new_short_name", &self.new_short_name)
    }

    fn write(&self, ctx: &EditContext, job: &JobHandle) -> EditResult<WriteOutcome> {
        let root = tree::instances_root(ctx.course_path());
        let old_path = root.join(tree::id_path(&self.short_name));
        let new_path = root.join(&self.new_short_name);
        job.log(format!(
            "Move files from {} to {}",
            old_path.display(),
            new_path.display()
        ));
        tree::move_path(&old_path, &new_path)?;
        tree::remove_empty_preceding_subfolders(&root, &self.short_name)?;
        Ok(WriteOutcome::new(
            format!(
                "rename course instance {} to {}",
                self.short_name, self.new_short_name
            ),
            vec![old_path, new_path],
        ))
    }
}

/// Delete a course instance and everything below it.
#[derive(Debug, Clone)]
pub struct InstanceDelete {
    /// Course instance being deleted.
    pub short_name: String,
}

impl EditStrategy for InstanceDelete {
    fn describe(&self) -> String {
        format!("Delete course instance {}", self.short_name)
    }

    fn can_edit(&self, _ctx: &EditContext) -> EditResult<()> {
        require_id("short_name", &self.short_name)
    }

    fn write(&self, ctx: &EditContext, job: &JobHandle) -> EditResult<WriteOutcome> {
        let root = tree::instances_root(ctx.course_path());
        let path = root.join(tree::id_path(&self.short_name));
        if !path.exists() {
            return Err(EditError::mutation("instance.delete", path, "missing"));
        }
        job.log(format!("Remove {}", path.display()));
        tree::remove_path(&path)?;
        tree::remove_empty_preceding_subfolders(&root, &self.short_name)?;
        Ok(WriteOutcome::new(
            format!("delete course instance {}", self.short_name),
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

    #[tokio::test]
    async fn copy_moves_to_next_term() -> TestResult<()> {
        let fixture = CourseFixture::new()?;
        fixture.add_instance("Fa23", "ci1", "Fall 2023")?;
        fixture.add_assessment("Fa23", "HW1", "a1", "Homework 1", &[])?;
        let (_store, job) = job().await?;

        let outcome = InstanceCopy {
            short_name: "Fa23".to_string(),
        }
        .write(&context(fixture.path()), &job)?;

        assert_eq!(outcome.summary, "copy course instance Fa23 to Sp24");
        let info = fixture.read_json("courseInstances/Sp24/infoCourseInstance.json")?;
        assert_eq!(info["longName"], "Replace this long name (Sp24)");
        assert_ne!(info["uuid"], "ci1");
        assert!(
            fixture
                .path()
                .join("courseInstances/Sp24/assessments/HW1/infoAssessment.json")
                .is_file()
        );
        Ok(())
    }

    #[tokio::test]
    async fn copy_falls_back_when_next_term_exists() -> TestResult<()> {
        let fixture = CourseFixture::new()?;
        fixture.add_instance("Fa23", "ci1", "Fall 2023")?;
        fixture.add_instance("Sp24", "ci2", "Spring 2024")?;
        let (_store, job) = job().await?;

        let outcome = InstanceCopy {
            short_name: "Fa23".to_string(),
        }
        .write(&context(fixture.path()), &job)?;
        assert_eq!(outcome.created_id.as_deref(), Some("Fa23_copy1"));
        Ok(())
    }

    #[tokio::test]
    async fn add_writes_minimal_descriptor() -> TestResult<()> {
        let fixture = CourseFixture::new()?;
        fixture.add_instance("New_1", "ci1", "Something")?;
        let (_store, job) = job().await?;

        let outcome = InstanceAdd.write(&context(fixture.path()), &job)?;
        assert_eq!(outcome.summary, "add course instance New_2");
        let info = fixture.read_json("courseInstances/New_2/infoCourseInstance.json")?;
        assert_eq!(info["longName"], "New (2)");
        assert_eq!(info["allowAccess"], json!([]));
        Ok(())
    }

    #[tokio::test]
    async fn rename_then_delete() -> TestResult<()> {
        let fixture = CourseFixture::new()?;
        fixture.add_instance("Fa23", "ci1", "Fall 2023")?;
        let (_store, job) = job().await?;
        let ctx = context(fixture.path());

        let renamed = InstanceRename {
            short_name: "Fa23".to_string(),
            new_short_name: "Fall2023".to_string(),
        }
        .write(&ctx, &job)?;
        assert_eq!(renamed.summary, "rename course instance Fa23 to Fall2023");

        let deleted = InstanceDelete {
            short_name: "Fall2023".to_string(),
        }
        .write(&ctx, &job)?;
        assert_eq!(deleted.summary, "delete course instance Fall2023");
        assert!(!fixture.path().join("courseInstances/Fall2023").exists());
        Ok(())
    }
}
