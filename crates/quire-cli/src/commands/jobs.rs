use std::io;

use anyhow::anyhow;
use quire_runtime::{JobStore, RuntimeError, SequenceId};

use crate::cli::{CliError, CliResult};
use crate::context::AppContext;
use crate::output::render_sequence;

pub(crate) fn handle_show(ctx: &AppContext, sequence_id: SequenceId) -> CliResult<()> {
    let dir = ctx.job_log_dir.as_deref().ok_or_else(|| {
        CliError::validation(
            "job log directory is not configured (pass --job-log-dir or set QUIRE_JOB_LOG_DIR)",
        )
    })?;
    let sequence = JobStore::load_persisted(dir, sequence_id).map_err(|err| match err {
        RuntimeError::Io { ref source, .. } if source.kind() == io::ErrorKind::NotFound => {
            CliError::validation(format!(
                "no job sequence {sequence_id} in {}",
                dir.display()
            ))
        }
        other => CliError::failure(anyhow!(other).context("failed to load job sequence")),
    })?;
    render_sequence(&sequence, ctx.output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::edit;
    use crate::context::testing::context;
    use anyhow::Result;
    use quire_editor::EditOperation;
    use quire_editor::strategy::QuestionCopy;
    use quire_test_support::CourseFixture;

    #[tokio::test]
    async fn persisted_sequences_can_be_shown() -> Result<()> {
        let fixture = CourseFixture::new()?;
        fixture.add_question("q1", "11111111-1111-4111-8111-111111111111", "One")?;
        let jobs_dir = fixture.scratch("jobs");
        let ctx = context(fixture.path(), Some(&jobs_dir));

        let report = edit::apply(
            &ctx,
            EditOperation::QuestionCopy(QuestionCopy {
                qid: "q1".to_string(),
            }),
        )
        .await?;
        let sequence_id = report
            .sequence_id
            .ok_or_else(|| anyhow!("edit recorded no sequence"))?;

        handle_show(&ctx, sequence_id)?;
        let stored = JobStore::load_persisted(&jobs_dir, sequence_id)?;
        assert_eq!(stored.meta.description, "Copy question q1");
        Ok(())
    }

    #[test]
    fn unknown_sequence_is_a_validation_error() -> Result<()> {
        let fixture = CourseFixture::new()?;
        let jobs_dir = fixture.scratch("jobs");
        std::fs::create_dir_all(&jobs_dir)?;
        let ctx = context(fixture.path(), Some(&jobs_dir));
        let err = handle_show(&ctx, SequenceId::new()).err();
        assert_eq!(err.map(|err| err.exit_code()), Some(2));
        Ok(())
    }

    #[test]
    fn show_requires_a_job_log_directory() -> Result<()> {
        let fixture = CourseFixture::new()?;
        let ctx = context(fixture.path(), None);
        let err = handle_show(&ctx, SequenceId::new()).err();
        assert_eq!(err.map(|err| err.exit_code()), Some(2));
        Ok(())
    }
}
