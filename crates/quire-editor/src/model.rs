//! Request-scoped values passed through every pipeline stage.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::warn;

/// Identity performing an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    /// Effective user id.
    pub user_id: String,
    /// Authenticated user id; differs from `user_id` under impersonation.
    pub authn_user_id: String,
    /// Display name used as the commit author.
    pub name: String,
    /// Login identifier, used as commit email when no email is known.
    pub uid: String,
    /// Email address used as the commit email.
    pub email: Option<String>,
}

impl Actor {
    /// Email recorded on commits: the address if known, else the uid.
    #[must_use]
    pub fn commit_email(&self) -> &str {
        self.email.as_deref().unwrap_or(&self.uid)
    }
}

/// Shared handle to a course and its cached head revision.
#[derive(Debug, Clone)]
pub struct CourseHandle {
    /// Course identifier.
    pub id: String,
    /// Absolute course root.
    pub path: PathBuf,
    /// Short display name, e.g. `TAM 212`.
    pub short_name: String,
    /// Whether this is the read-only example course.
    pub example_course: bool,
    commit_hash: Arc<RwLock<Option<String>>>,
}

impl CourseHandle {
    /// Create a handle with no cached revision.
    #[must_use]
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>, short_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            short_name: short_name.into(),
            example_course: false,
            commit_hash: Arc::new(RwLock::new(None)),
        }
    }

    /// Mark the course as the example course.
    #[must_use]
    pub const fn as_example(mut self) -> Self {
        self.example_course = true;
        self
    }

    /// Last revision recorded for this course.
    #[must_use]
    pub fn commit_hash(&self) -> Option<String> {
        match self.commit_hash.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => {
                warn!("commit hash lock poisoned; continuing with recovered guard");
                poisoned.into_inner().clone()
            }
        }
    }

    /// Record a new head revision; shared by every clone of the handle.
    pub fn set_commit_hash(&self, hash: impl Into<String>) {
        let hash = hash.into();
        match self.commit_hash.write() {
            Ok(mut guard) => *guard = Some(hash),
            Err(poisoned) => {
                warn!("commit hash lock poisoned; continuing with recovered guard");
                *poisoned.into_inner() = Some(hash);
            }
        }
    }

    /// Lock name guarding this course directory.
    #[must_use]
    pub fn lock_name(&self) -> String {
        format!("coursedir:{}", self.path.display())
    }
}

/// Immutable inputs shared by every stage of one edit.
#[derive(Debug, Clone)]
pub struct EditContext {
    /// Who is editing.
    pub actor: Actor,
    /// Which course is edited.
    pub course: CourseHandle,
    /// Whether the actor holds edit permission on the course.
    pub has_edit_permission: bool,
}

impl EditContext {
    /// Course root.
    #[must_use]
    pub fn course_path(&self) -> &Path {
        &self.course.path
    }
}

/// Area of the course a file operation may touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContainer {
    /// Course root the container belongs to.
    pub course: PathBuf,
    /// Directory every target must stay inside.
    pub root: PathBuf,
    /// Sub-trees inside `root` that file operations must not reach.
    pub invalid_roots: Vec<PathBuf>,
    /// Files that may not be deleted or renamed directly.
    pub immovable: Vec<PathBuf>,
}

impl FileContainer {
    /// Container rooted at the course directory, excluding the structural
    /// entity trees and the course descriptor.
    #[must_use]
    pub fn course_files(course: &Path) -> Self {
        Self {
            course: course.to_path_buf(),
            root: course.to_path_buf(),
            invalid_roots: vec![
                crate::tree::questions_root(course),
                crate::tree::instances_root(course),
            ],
            immovable: vec![course.join(crate::tree::COURSE_DESCRIPTOR)],
        }
    }

    /// Container rooted at a directory of `course`, with no exclusions.
    #[must_use]
    pub fn rooted_at(course: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Self {
            course: course.into(),
            root: root.into(),
            invalid_roots: Vec::new(),
            immovable: Vec::new(),
        }
    }

    /// Summary prefix: empty for the course root, else `"<basename>: "`.
    #[must_use]
    pub fn summary_prefix(&self) -> String {
        if crate::paths::normalize(&self.root) == crate::paths::normalize(&self.course) {
            return String::new();
        }
        self.root
            .file_name()
            .map(|name| format!("{}: ", name.to_string_lossy()))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_email_falls_back_to_uid() {
        let mut actor = Actor {
            user_id: "1".to_string(),
            authn_user_id: "1".to_string(),
            name: "Dev".to_string(),
            uid: "dev@school.edu".to_string(),
            email: None,
        };
        assert_eq!(actor.commit_email(), "dev@school.edu");
        actor.email = Some("dev@example.com".to_string());
        assert_eq!(actor.commit_email(), "dev@example.com");
    }

    #[test]
    fn commit_hash_is_shared_between_clones() {
        let course = CourseHandle::new("1", "/srv/course", "TEST 101");
        let clone = course.clone();
        clone.set_commit_hash("abc123");
        assert_eq!(course.commit_hash().as_deref(), Some("abc123"));
        assert_eq!(course.lock_name(), "coursedir:/srv/course");
    }

    #[test]
    fn summary_prefix_depends_on_root() {
        let course = Path::new("/srv/course");
        assert_eq!(FileContainer::course_files(course).summary_prefix(), "");
        let elements =
            FileContainer::rooted_at(course, "/srv/course/questions/q1/clientFilesQuestion");
        assert_eq!(elements.summary_prefix(), "clientFilesQuestion: ");
    }
}
