//! Version-control commands run by the pipeline.
//!
//! Every command runs with the course root as working directory and the
//! configured git environment (for example `GIT_SSH_COMMAND`).

use std::path::{Path, PathBuf};

use quire_runtime::ProcessCommand;

use crate::model::Actor;
use crate::paths;

const GIT: &str = "git";

/// Builder for the git invocations of one course.
#[derive(Debug, Clone)]
pub struct GitCommands {
    course_path: PathBuf,
    branch: String,
    env: Vec<(String, String)>,
}

impl GitCommands {
    /// Commands for the repository at `course_path`, resetting against
    /// `origin/<branch>`.
    #[must_use]
    pub fn new(
        course_path: impl Into<PathBuf>,
        branch: impl Into<String>,
        env: Vec<(String, String)>,
    ) -> Self {
        Self {
            course_path: course_path.into(),
            branch: branch.into(),
            env,
        }
    }

    /// `git clean -fdx`
    #[must_use]
    pub fn clean(&self) -> ProcessCommand {
        self.git(["clean", "-fdx"])
    }

    /// `git reset --hard origin/<branch>`
    #[must_use]
    pub fn reset_to_remote(&self) -> ProcessCommand {
        self.git(["reset", "--hard"])
            .arg(format!("origin/{}", self.branch))
    }

    /// `git add <paths>`, with paths made relative to the course root.
    #[must_use]
    pub fn add(&self, changed: &[PathBuf]) -> ProcessCommand {
        let relative = changed
            .iter()
            .map(|path| self.relative(path))
            .collect::<Vec<_>>();
        self.git(["add"]).args(relative)
    }

    /// `git -c user.name=<name> -c user.email=<email> commit -m <message>`
    #[must_use]
    pub fn commit(&self, actor: &Actor, message: &str) -> ProcessCommand {
        self.git(["-c"])
            .arg(format!("user.name={}", actor.name))
            .arg("-c")
            .arg(format!("user.email={}", actor.commit_email()))
            .args(["commit", "-m"])
            .arg(message)
    }

    /// `git push`
    #[must_use]
    pub fn push(&self) -> ProcessCommand {
        self.git(["push"])
    }

    /// `git reset --hard HEAD~1`
    #[must_use]
    pub fn rollback(&self) -> ProcessCommand {
        self.git(["reset", "--hard", "HEAD~1"])
    }

    /// `git rev-parse HEAD`
    #[must_use]
    pub fn rev_parse_head(&self) -> ProcessCommand {
        self.git(["rev-parse", "HEAD"])
    }

    fn git<const N: usize>(&self, args: [&str; N]) -> ProcessCommand {
        ProcessCommand::new(GIT)
            .args(args)
            .current_dir(&self.course_path)
            .envs(self.env.iter().cloned())
    }

    fn relative(&self, path: &Path) -> String {
        if path.is_absolute() {
            paths::relative_display(&self.course_path, path)
        } else {
            path.to_string_lossy().into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(email: Option<&str>) -> Actor {
        Actor {
            user_id: "7".to_string(),
            authn_user_id: "7".to_string(),
            name: "Dev Instructor".to_string(),
            uid: "dev@school.edu".to_string(),
            email: email.map(str::to_string),
        }
    }

    fn commands() -> GitCommands {
        GitCommands::new(
            "/srv/course",
            "main",
            vec![("GIT_SSH_COMMAND".to_string(), "ssh -i key".to_string())],
        )
    }

    #[test]
    fn reset_targets_configured_branch() {
        let command = commands().reset_to_remote();
        assert_eq!(command.args, vec!["reset", "--hard", "origin/main"]);
        assert_eq!(command.working_dir.as_deref(), Some(Path::new("/srv/course")));
        assert_eq!(
            command.env,
            vec![("GIT_SSH_COMMAND".to_string(), "ssh -i key".to_string())]
        );
    }

    #[test]
    fn add_stages_paths_relative_to_course() {
        let command = commands().add(&[
            PathBuf::from("/srv/course/questions/topic/q2"),
            PathBuf::from("courseInstances/Fa23/assessments/HW1/infoAssessment.json"),
        ]);
        assert_eq!(
            command.args,
            vec![
                "add",
                "questions/topic/q2",
                "courseInstances/Fa23/assessments/HW1/infoAssessment.json"
            ]
        );
    }

    #[test]
    fn commit_uses_actor_identity() {
        let command = commands().commit(&actor(None), "copy question q1 to question-2");
        assert_eq!(
            command.args,
            vec![
                "-c",
                "user.name=Dev Instructor",
                "-c",
                "user.email=dev@school.edu",
                "commit",
                "-m",
                "copy question q1 to question-2"
            ]
        );
        let with_email = commands().commit(&actor(Some("dev@example.com")), "m");
        assert_eq!(with_email.args[3], "user.email=dev@example.com");
    }

    #[test]
    fn rollback_drops_one_revision() {
        assert_eq!(commands().rollback().args, vec!["reset", "--hard", "HEAD~1"]);
        assert_eq!(commands().clean().args, vec!["clean", "-fdx"]);
        assert_eq!(commands().rev_parse_head().display(), "git rev-parse HEAD");
    }
}
