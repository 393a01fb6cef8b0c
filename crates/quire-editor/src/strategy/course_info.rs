//! Creation of a missing course descriptor.

use quire_runtime::JobHandle;
use serde_json::json;

use super::{EditStrategy, WriteOutcome};
use crate::descriptor;
use crate::error::EditResult;
use crate::model::EditContext;
use crate::tree::COURSE_DESCRIPTOR;

/// Write a default `infoCourse.json`; fails if one already exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct CourseInfoCreate;

impl EditStrategy for CourseInfoCreate {
    fn describe(&self) -> String {
        format!("Create {COURSE_DESCRIPTOR}")
    }

    fn write(&self, ctx: &EditContext, job: &JobHandle) -> EditResult<WriteOutcome> {
        let course = ctx.course_path();
        let name = course
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let path = course.join(COURSE_DESCRIPTOR);
        let uuid = descriptor::new_uuid();
        job.log(format!("Write {}", path.display()));
        descriptor::create(
            &path,
            &json!({
                "uuid": uuid,
                "name": name,
                "title": name,
                "options": { "useNewQuestionRenderer": true },
                "tags": [],
                "topics": [],
            }),
        )?;
        Ok(WriteOutcome::new(format!("create {COURSE_DESCRIPTOR}"), vec![path]).created(name, uuid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EditError;
    use crate::strategy::testing::{context, job};
    use anyhow::Result;
    use quire_test_support::CourseFixture;

    type TestResult<T> = Result<T>;

    #[tokio::test]
    async fn creates_descriptor_named_after_directory() -> TestResult<()> {
        let fixture = CourseFixture::bare()?;
        let (_store, job) = job().await?;
        let outcome = CourseInfoCreate.write(&context(fixture.path()), &job)?;

        assert_eq!(outcome.summary, "create infoCourse.json");
        let info = fixture.read_json("infoCourse.json")?;
        assert_eq!(info["name"], "course");
        assert_eq!(info["title"], "course");
        assert_eq!(info["options"]["useNewQuestionRenderer"], true);
        assert_eq!(info["uuid"].as_str(), outcome.created_uuid.as_deref());
        Ok(())
    }

    #[tokio::test]
    async fn refuses_to_overwrite() -> TestResult<()> {
        let fixture = CourseFixture::new()?;
        let before = fixture.read_json("infoCourse.json")?;
        let (_store, job) = job().await?;
        let err = CourseInfoCreate.write(&context(fixture.path()), &job).err();
        assert!(matches!(err, Some(EditError::MutationFailure { .. })));
        assert_eq!(fixture.read_json("infoCourse.json")?, before);
        Ok(())
    }
}
