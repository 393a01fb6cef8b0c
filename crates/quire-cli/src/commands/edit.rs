//! Translate edit subcommands into pipeline operations and run them.

use std::fs;
use std::path::Path;

use anyhow::anyhow;
use quire_editor::strategy::{
    AssessmentAdd, AssessmentCopy, AssessmentDelete, AssessmentRename, CourseInfoCreate, FileDelete,
    FileRename, FileUpload, InstanceAdd, InstanceCopy, InstanceDelete, InstanceRename, QuestionAdd,
    QuestionCopy, QuestionDelete, QuestionRename, QuestionTransfer,
};
use quire_editor::{EditError, EditOperation, EditReport, EditStatus, FailureKind, FileContainer};
use tracing::info;

use crate::cli::{
    AssessmentCommand, CliError, CliResult, ContainerArgs, CourseInfoCommand, FileCommand,
    InstanceCommand, QuestionCommand,
};
use crate::context::AppContext;
use crate::output::render_report;

pub(crate) fn question(command: QuestionCommand, ctx: &AppContext) -> CliResult<EditOperation> {
    Ok(match command {
        QuestionCommand::Add(args) => {
            let template_dir = args
                .template
                .or_else(|| ctx.config.question_template_dir.clone())
                .ok_or_else(|| {
                    CliError::validation(
                        "question add needs --template or question_template_dir in the configuration",
                    )
                })?;
            EditOperation::QuestionAdd(QuestionAdd { template_dir })
        }
        QuestionCommand::Copy(args) => EditOperation::QuestionCopy(QuestionCopy { qid: args.qid }),
        QuestionCommand::Rename(args) => EditOperation::QuestionRename(QuestionRename {
            qid: args.qid,
            new_qid: args.new_qid,
            expected_references: None,
        }),
        QuestionCommand::Delete(args) => {
            EditOperation::QuestionDelete(QuestionDelete { qid: args.qid })
        }
        QuestionCommand::Transfer(args) => {
            let source_course = args
                .from_name
                .unwrap_or_else(|| directory_name(&args.from));
            EditOperation::QuestionTransfer(QuestionTransfer {
                source_path: args.from.join("questions").join(&args.qid),
                source_qid: args.qid,
                source_course,
            })
        }
    })
}

pub(crate) fn assessment(command: AssessmentCommand) -> EditOperation {
    match command {
        AssessmentCommand::Add(scope) => EditOperation::AssessmentAdd(AssessmentAdd {
            course_instance: scope.course_instance,
        }),
        AssessmentCommand::Copy(args) => EditOperation::AssessmentCopy(AssessmentCopy {
            course_instance: args.scope.course_instance,
            tid: args.tid,
        }),
        AssessmentCommand::Rename(args) => EditOperation::AssessmentRename(AssessmentRename {
            course_instance: args.scope.course_instance,
            tid: args.tid,
            new_tid: args.new_tid,
        }),
        AssessmentCommand::Delete(args) => EditOperation::AssessmentDelete(AssessmentDelete {
            course_instance: args.scope.course_instance,
            tid: args.tid,
        }),
    }
}

pub(crate) fn instance(command: InstanceCommand) -> EditOperation {
    match command {
        InstanceCommand::Add => EditOperation::InstanceAdd(InstanceAdd),
        InstanceCommand::Copy(args) => EditOperation::InstanceCopy(InstanceCopy {
            short_name: args.short_name,
        }),
        InstanceCommand::Rename(args) => EditOperation::InstanceRename(InstanceRename {
            short_name: args.short_name,
            new_short_name: args.new_short_name,
        }),
        InstanceCommand::Delete(args) => EditOperation::InstanceDelete(InstanceDelete {
            short_name: args.short_name,
        }),
    }
}

pub(crate) fn file(command: FileCommand, ctx: &AppContext) -> CliResult<EditOperation> {
    let course = ctx.course_root()?;
    Ok(match command {
        FileCommand::Delete(args) => EditOperation::FileDelete(FileDelete {
            container: container(&course, &args.container),
            path: args.path,
        }),
        FileCommand::Rename(args) => EditOperation::FileRename(FileRename {
            container: container(&course, &args.container),
            old_path: args.old_path,
            new_path: args.new_path,
        }),
        FileCommand::Upload(args) => {
            let contents = fs::read(&args.from).map_err(|err| {
                CliError::validation(format!("cannot read {}: {err}", args.from.display()))
            })?;
            EditOperation::FileUpload(FileUpload {
                container: container(&course, &args.container),
                path: args.path,
                contents,
            })
        }
    })
}

pub(crate) fn course_info(command: CourseInfoCommand) -> EditOperation {
    match command {
        CourseInfoCommand::Create => EditOperation::CourseInfoCreate(CourseInfoCreate),
    }
}

/// Run `operation` and render its report.
pub(crate) async fn handle(ctx: &AppContext, operation: EditOperation) -> CliResult<()> {
    let report = apply(ctx, operation).await?;
    render_report(&report, ctx.output)?;
    match (&report.status, &report.failure) {
        (EditStatus::Failed, Some(failure)) => Err(CliError::failure(anyhow!(
            "{} failed at {}: {}",
            report.description,
            failure.state.as_str(),
            failure.message
        ))),
        (EditStatus::Failed, None) => Err(CliError::failure(anyhow!(
            "{} failed",
            report.description
        ))),
        _ => Ok(()),
    }
}

pub(crate) async fn apply(ctx: &AppContext, operation: EditOperation) -> CliResult<EditReport> {
    let edit = ctx.edit_context()?;
    let pipeline = ctx.pipeline()?;
    let kind = operation.kind();
    let report = pipeline
        .apply(&edit, operation)
        .await
        .map_err(|err| rejection(&err))?;
    info!(
        operation = kind,
        status = report.status.as_str(),
        "edit finished"
    );
    Ok(report)
}

fn rejection(err: &EditError) -> CliError {
    match err.kind() {
        FailureKind::PermissionDenied | FailureKind::InvalidIdentifier => {
            CliError::validation(err.detail())
        }
        _ => CliError::failure(anyhow!(err.detail())),
    }
}

fn container(course: &Path, args: &ContainerArgs) -> FileContainer {
    match &args.root {
        Some(root) => FileContainer::rooted_at(course, course.join(root)),
        None => FileContainer::course_files(course),
    }
}

fn directory_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{
        ContainerArgs, FileUploadArgs, QuestionAddArgs, QuestionArgs, QuestionRenameArgs,
    };
    use crate::context::testing::context;
    use anyhow::{Result, anyhow};
    use quire_runtime::{FileLocks, LockManager};
    use quire_test_support::CourseFixture;
    use std::time::Duration;

    #[tokio::test]
    async fn question_copy_runs_without_git() -> Result<()> {
        let fixture = CourseFixture::new()?;
        fixture.add_question("q1", "11111111-1111-4111-8111-111111111111", "One")?;
        let ctx = context(fixture.path(), None);

        let operation = question(
            QuestionCommand::Copy(QuestionArgs {
                qid: "q1".to_string(),
            }),
            &ctx,
        )?;
        let report = apply(&ctx, operation).await?;

        assert_eq!(report.status, EditStatus::Succeeded);
        assert_eq!(report.created_id.as_deref(), Some("question-1"));
        assert!(fixture.path().join("questions/question-1/info.json").is_file());
        Ok(())
    }

    #[tokio::test]
    async fn invalid_rename_is_a_validation_error() -> Result<()> {
        let fixture = CourseFixture::new()?;
        fixture.add_question("q1", "11111111-1111-4111-8111-111111111111", "One")?;
        let ctx = context(fixture.path(), None);

        let operation = question(
            QuestionCommand::Rename(QuestionRenameArgs {
                qid: "q1".to_string(),
                new_qid: "../evil".to_string(),
            }),
            &ctx,
        )?;
        let err = apply(&ctx, operation).await.err();
        assert_eq!(err.map(|err| err.exit_code()), Some(2));
        assert!(fixture.path().join("questions/q1").is_dir());
        Ok(())
    }

    #[tokio::test]
    async fn failed_edit_exits_with_failure() -> Result<()> {
        let fixture = CourseFixture::new()?;
        let ctx = context(fixture.path(), None);

        let operation = question(
            QuestionCommand::Delete(QuestionArgs {
                qid: "missing".to_string(),
            }),
            &ctx,
        )?;
        let err = handle(&ctx, operation).await.err();
        assert_eq!(err.map(|err| err.exit_code()), Some(3));
        Ok(())
    }

    #[tokio::test]
    async fn course_lock_is_shared_with_other_processes() -> Result<()> {
        let fixture = CourseFixture::new()?;
        fixture.add_question("q1", "11111111-1111-4111-8111-111111111111", "One")?;
        let lock_dir = fixture.scratch("locks");
        let mut ctx = context(fixture.path(), None);
        ctx.config.lock_dir = Some(lock_dir.clone());
        ctx.config.lock_timeout_ms = 100;
        let lock_name = ctx
            .edit_context()
            .map_err(|err| anyhow!(err.display_message()))?
            .course
            .lock_name();

        let other_process = FileLocks::new(&lock_dir);
        let held = other_process
            .acquire(&lock_name, Duration::from_millis(50))
            .await?;
        let copy = || {
            EditOperation::QuestionCopy(QuestionCopy {
                qid: "q1".to_string(),
            })
        };
        let report = apply(&ctx, copy()).await?;
        assert_eq!(report.status, EditStatus::Failed);
        assert_eq!(
            report.failure.map(|failure| failure.kind),
            Some(FailureKind::LockTimeout)
        );
        assert!(!fixture.path().join("questions/question-1").exists());

        other_process.release(held).await?;
        let report = apply(&ctx, copy()).await?;
        assert_eq!(report.status, EditStatus::Succeeded);
        Ok(())
    }

    #[test]
    fn question_add_requires_a_template() -> Result<()> {
        let fixture = CourseFixture::new()?;
        let ctx = context(fixture.path(), None);
        let err = question(
            QuestionCommand::Add(QuestionAddArgs { template: None }),
            &ctx,
        )
        .err();
        assert_eq!(err.map(|err| err.exit_code()), Some(2));
        Ok(())
    }

    #[tokio::test]
    async fn repeated_upload_is_unchanged() -> Result<()> {
        let fixture = CourseFixture::new()?;
        let local = fixture.scratch("notes.txt");
        std::fs::write(&local, "lecture notes")?;
        let ctx = context(fixture.path(), None);
        let upload = || {
            file(
                FileCommand::Upload(FileUploadArgs {
                    container: ContainerArgs { root: None },
                    from: local.clone(),
                    path: "clientFilesCourse/notes.txt".into(),
                }),
                &ctx,
            )
        };

        let first = apply(&ctx, upload()?).await?;
        assert_eq!(first.status, EditStatus::Succeeded);
        let second = apply(&ctx, upload()?).await?;
        assert_eq!(second.status, EditStatus::Unchanged);
        assert_eq!(
            std::fs::read_to_string(fixture.path().join("clientFilesCourse/notes.txt"))?,
            "lecture notes"
        );
        Ok(())
    }

    #[test]
    fn transfer_defaults_source_name_to_directory() -> Result<()> {
        let fixture = CourseFixture::new()?;
        let ctx = context(fixture.path(), None);
        let operation = question(
            QuestionCommand::Transfer(crate::cli::QuestionTransferArgs {
                from: "/srv/courses/TAM212".into(),
                from_name: None,
                qid: "topic/q1".to_string(),
            }),
            &ctx,
        )?;
        match operation {
            EditOperation::QuestionTransfer(transfer) => {
                assert_eq!(transfer.source_course, "TAM212");
                assert_eq!(
                    transfer.source_path,
                    Path::new("/srv/courses/TAM212/questions/topic/q1")
                );
            }
            other => return Err(anyhow!("unexpected operation {}", other.kind())),
        }
        Ok(())
    }
}
