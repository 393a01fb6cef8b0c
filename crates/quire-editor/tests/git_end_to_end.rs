//! End-to-end edits against a real git repository with a local bare remote.
//!
//! Skipped when no `git` executable is available.

use std::fs;
use std::time::Duration;

use anyhow::{Result, anyhow};
use quire_editor::strategy::QuestionCopy;
use quire_editor::{
    Actor, Collaborators, CourseHandle, EditContext, EditOperation, EditPipeline, EditStatus,
    PipelineSettings, PipelineState, StepStatus,
};
use quire_events::EventBus;
use quire_runtime::{JobRecorder, JobStore, SequenceStatus};
use quire_telemetry::Metrics;
use quire_test_support::CourseFixture;
use quire_test_support::git::{commit_count, commit_subject, git_available, init_course_repo, run_git};

type TestResult<T> = Result<T>;

const SOURCE_UUID: &str = "aaaaaaaa-aaaa-4aaa-8aaa-aaaaaaaaaaaa";

struct GitCourse {
    fixture: CourseFixture,
    store: JobStore,
    pipeline: EditPipeline,
    ctx: EditContext,
}

impl GitCourse {
    fn new() -> TestResult<Self> {
        let fixture = CourseFixture::new()?;
        fixture.add_question("question-1", SOURCE_UUID, "Original")?;
        init_course_repo(fixture.path(), &fixture.scratch("remote.git"))?;

        let store = JobStore::in_memory();
        let settings = PipelineSettings {
            use_git: true,
            lock_timeout: Duration::from_secs(5),
            ..PipelineSettings::default()
        };
        let pipeline = EditPipeline::new(
            settings,
            Collaborators::local(store.clone()),
            EventBus::new(),
            Metrics::new()?,
        );
        let ctx = EditContext {
            actor: Actor {
                user_id: "5".to_string(),
                authn_user_id: "5".to_string(),
                name: "Git Editor".to_string(),
                uid: "git-editor".to_string(),
                email: Some("git-editor@example.com".to_string()),
            },
            course: CourseHandle::new("1", fixture.path(), "GIT 101"),
            has_edit_permission: true,
        };
        Ok(Self {
            fixture,
            store,
            pipeline,
            ctx,
        })
    }

    fn copy_operation() -> EditOperation {
        EditOperation::QuestionCopy(QuestionCopy {
            qid: "question-1".to_string(),
        })
    }
}

#[tokio::test]
async fn copy_creates_exactly_one_pushed_commit() -> TestResult<()> {
    if !git_available() {
        return Ok(());
    }
    let course = GitCourse::new()?;
    let report = course
        .pipeline
        .apply(&course.ctx, GitCourse::copy_operation())
        .await?;

    assert_eq!(report.status, EditStatus::Succeeded, "{report:?}");
    assert_eq!(report.created_id.as_deref(), Some("question-2"));
    let root = course.fixture.path();
    assert_eq!(commit_count(root)?, 2);
    assert_eq!(
        commit_subject(root, "HEAD")?,
        "copy question question-1 to question-2"
    );
    assert_eq!(
        run_git(root, &["log", "-1", "--format=%an <%ae>"])?,
        "Git Editor <git-editor@example.com>"
    );

    let head = run_git(root, &["rev-parse", "HEAD"])?;
    assert_eq!(run_git(root, &["rev-parse", "origin/master"])?, head);
    assert_eq!(report.commit_hash.as_deref(), Some(head.as_str()));

    let copied = course.fixture.read_json("questions/question-2/info.json")?;
    assert_eq!(copied["title"], "Replace this title");
    assert_ne!(copied["uuid"], SOURCE_UUID);
    assert_eq!(copied["topic"], "Fixtures");
    assert!(root.join("questions/question-2/question.html").is_file());
    Ok(())
}

#[tokio::test]
async fn stray_files_are_cleaned_before_writing() -> TestResult<()> {
    if !git_available() {
        return Ok(());
    }
    let course = GitCourse::new()?;
    course.fixture.write_file("scratch.txt", "left behind")?;
    course
        .fixture
        .write_file("questions/question-1/question.html", "<p>dirty</p>\n")?;

    let report = course
        .pipeline
        .apply(&course.ctx, GitCourse::copy_operation())
        .await?;

    assert!(report.succeeded());
    let root = course.fixture.path();
    assert!(!root.join("scratch.txt").exists());
    assert_eq!(
        fs::read_to_string(root.join("questions/question-2/question.html"))?,
        "<p>Original</p>\n"
    );
    assert_eq!(run_git(root, &["status", "--porcelain"])?, "");
    Ok(())
}

#[tokio::test]
async fn rejected_push_rolls_back_the_commit() -> TestResult<()> {
    if !git_available() {
        return Ok(());
    }
    let course = GitCourse::new()?;
    fs::remove_dir_all(course.fixture.scratch("remote.git"))?;

    let report = course
        .pipeline
        .apply(&course.ctx, GitCourse::copy_operation())
        .await?;

    assert_eq!(report.status, EditStatus::Failed);
    let failure = report.failure.clone().ok_or_else(|| anyhow!("no failure"))?;
    assert_eq!(failure.state, PipelineState::Publishing);
    assert_eq!(
        report.state_status(PipelineState::RollingBack),
        Some(StepStatus::Completed)
    );
    assert_eq!(
        report.state_status(PipelineState::Unlocking),
        Some(StepStatus::Completed)
    );

    let root = course.fixture.path();
    assert_eq!(commit_count(root)?, 1);
    assert!(!root.join("questions/question-2").exists());
    assert!(course.ctx.course.commit_hash().is_none());

    let sequence_id = report.sequence_id.ok_or_else(|| anyhow!("no sequence"))?;
    let sequence = course
        .store
        .sequence(sequence_id)
        .await?
        .ok_or_else(|| anyhow!("sequence not recorded"))?;
    assert_eq!(sequence.status, SequenceStatus::Error);
    let push = sequence.job("git_push").ok_or_else(|| anyhow!("no push job"))?;
    assert_eq!(push.exit_code.map(|code| code != 0), Some(true));
    assert!(sequence.job("git_reset").is_some());
    Ok(())
}
