//! Course tree layout and directory-level mutations.
//!
//! # Design
//! - Entities are directories holding a descriptor file; identifiers may be
//!   nested (`topic/q1`), so discovery recurses until it finds a descriptor.
//! - Copies and moves never overwrite an existing destination.
//! - After a delete or move, empty intermediate folders of a nested id are
//!   pruned so the next sync does not see phantom entities.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::descriptor;
use crate::error::{EditError, EditResult};

/// Directory holding questions.
pub const QUESTIONS_DIR: &str = "questions";
/// Directory holding course instances.
pub const COURSE_INSTANCES_DIR: &str = "courseInstances";
/// Directory (inside a course instance) holding assessments.
pub const ASSESSMENTS_DIR: &str = "assessments";
/// Question descriptor file name.
pub const QUESTION_DESCRIPTOR: &str = "info.json";
/// Assessment descriptor file name.
pub const ASSESSMENT_DESCRIPTOR: &str = "infoAssessment.json";
/// Course instance descriptor file name.
pub const INSTANCE_DESCRIPTOR: &str = "infoCourseInstance.json";
/// Course descriptor file name.
pub const COURSE_DESCRIPTOR: &str = "infoCourse.json";

/// Location of an assessment within a course.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssessmentLocation {
    /// Course instance short name.
    pub course_instance: String,
    /// Assessment identifier.
    pub tid: String,
}

impl AssessmentLocation {
    /// Descriptor path of this assessment below `course`.
    #[must_use]
    pub fn descriptor_path(&self, course: &Path) -> PathBuf {
        assessments_root(course, &self.course_instance)
            .join(id_path(&self.tid))
            .join(ASSESSMENT_DESCRIPTOR)
    }
}

/// `<course>/questions`.
#[must_use]
pub fn questions_root(course: &Path) -> PathBuf {
    course.join(QUESTIONS_DIR)
}

/// `<course>/courseInstances`.
#[must_use]
pub fn instances_root(course: &Path) -> PathBuf {
    course.join(COURSE_INSTANCES_DIR)
}

/// `<course>/courseInstances/<ci>/assessments`.
#[must_use]
pub fn assessments_root(course: &Path, course_instance: &str) -> PathBuf {
    instances_root(course)
        .join(id_path(course_instance))
        .join(ASSESSMENTS_DIR)
}

/// Convert a `/`-separated identifier into a relative path.
#[must_use]
pub fn id_path(id: &str) -> PathBuf {
    id.split('/').filter(|part| !part.is_empty()).collect()
}

/// Identifiers of every entity below `root`, sorted.
///
/// A directory holding `descriptor` is an entity; other directories are
/// searched recursively. A missing root yields no identifiers.
///
/// # Errors
///
/// Returns an error if a directory cannot be listed.
pub fn existing_ids(root: &Path, descriptor_name: &str) -> EditResult<Vec<String>> {
    let mut ids = Vec::new();
    collect_ids(root, "", descriptor_name, &mut ids)?;
    ids.sort();
    Ok(ids)
}

/// Names unavailable for a new entity below `root`, sorted.
///
/// The union of [`existing_ids`] and every top-level entry of `root`, so a
/// leftover directory without a descriptor still reserves its name.
///
/// # Errors
///
/// Returns an error if a directory cannot be listed.
pub fn taken_ids(root: &Path, descriptor_name: &str) -> EditResult<Vec<String>> {
    let mut ids = existing_ids(root, descriptor_name)?;
    match fs::read_dir(root) {
        Ok(entries) => {
            for entry in entries {
                let entry = entry.map_err(|source| EditError::io("tree.list", root, source))?;
                ids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {}
        Err(err) => return Err(EditError::io("tree.list", root, err)),
    }
    ids.sort();
    ids.dedup();
    Ok(ids)
}

fn collect_ids(
    root: &Path,
    relative: &str,
    descriptor_name: &str,
    ids: &mut Vec<String>,
) -> EditResult<()> {
    let dir = root.join(id_path(relative));
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
            return Ok(());
        }
        Err(err) => return Err(EditError::io("tree.list", &dir, err)),
    };
    for entry in entries {
        let entry = entry.map_err(|source| EditError::io("tree.list", &dir, source))?;
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let id = if relative.is_empty() {
            name
        } else {
            format!("{relative}/{name}")
        };
        if entry.path().join(descriptor_name).is_file() {
            ids.push(id);
        } else {
            collect_ids(root, &id, descriptor_name, ids)?;
        }
    }
    Ok(())
}

/// Values of string field `field` across every entity below `root`.
///
/// Descriptors that cannot be parsed are skipped with a warning; they do not
/// contribute names but must not block an edit.
///
/// # Errors
///
/// Returns an error if a directory cannot be listed.
pub fn existing_titles(root: &Path, descriptor_name: &str, field: &str) -> EditResult<Vec<String>> {
    let mut titles = Vec::new();
    for id in existing_ids(root, descriptor_name)? {
        let path = root.join(id_path(&id)).join(descriptor_name);
        match descriptor::read(&path) {
            Ok(document) => {
                if let Some(title) = descriptor::string_field(&document, field) {
                    titles.push(title.to_string());
                }
            }
            Err(err) => warn!(
                path = %path.display(),
                error = %err.detail(),
                "skipping unreadable descriptor"
            ),
        }
    }
    Ok(titles)
}

/// Copy the directory tree at `source` to `destination`.
///
/// # Errors
///
/// Returns [`EditError::MutationFailure`] if the source is not a directory or
/// the destination already exists, and IO errors from the copy itself.
pub fn copy_tree(source: &Path, destination: &Path) -> EditResult<()> {
    if !source.is_dir() {
        return Err(EditError::mutation("copy_tree.source", source, "missing"));
    }
    if destination.exists() {
        return Err(EditError::mutation(
            "copy_tree.destination",
            destination,
            "already_exists",
        ));
    }

    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|err| EditError::walkdir("copy_tree.walk", source, err))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| EditError::mutation("copy_tree.relative", entry.path(), "strip_prefix"))?;
        let target_path = destination.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target_path)
                .map_err(|err| EditError::io("copy_tree.create_dir", &target_path, err))?;
        } else {
            if let Some(parent) = target_path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|err| EditError::io("copy_tree.create_parent", parent, err))?;
            }
            fs::copy(entry.path(), &target_path)
                .map_err(|err| EditError::io("copy_tree.copy_file", &target_path, err))?;
        }
    }
    debug!(
        source = %source.display(),
        destination = %destination.display(),
        "copied tree"
    );
    Ok(())
}

/// Move `source` to `destination`, creating the destination's parent.
///
/// # Errors
///
/// Returns [`EditError::MutationFailure`] if the source is missing or the
/// destination already exists, and IO errors from the rename.
pub fn move_path(source: &Path, destination: &Path) -> EditResult<()> {
    if !source.exists() {
        return Err(EditError::mutation("move.source", source, "missing"));
    }
    if destination.exists() {
        return Err(EditError::mutation(
            "move.destination",
            destination,
            "already_exists",
        ));
    }
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|err| EditError::io("move.create_parent", parent, err))?;
    }
    fs::rename(source, destination).map_err(|err| EditError::io("move.rename", destination, err))
}

/// Remove a file or directory tree; a missing path is not an error.
///
/// # Errors
///
/// Returns an IO error if the path exists but cannot be removed.
pub fn remove_path(path: &Path) -> EditResult<()> {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
        Err(err) => Err(err),
    };
    result.map_err(|err| EditError::io("remove", path, err))
}

/// Remove empty intermediate directories of nested id `id` below `root`,
/// deepest first, stopping at the first non-empty one.
///
/// # Errors
///
/// Returns an IO error if a directory cannot be listed or removed.
pub fn remove_empty_preceding_subfolders(root: &Path, id: &str) -> EditResult<()> {
    let parts: Vec<&str> = id.split('/').filter(|part| !part.is_empty()).collect();
    for depth in (1..parts.len()).rev() {
        let dir: PathBuf = std::iter::once(root.to_path_buf())
            .chain(parts[..depth].iter().map(PathBuf::from))
            .collect();
        let mut entries =
            fs::read_dir(&dir).map_err(|err| EditError::io("prune.list", &dir, err))?;
        if entries.next().is_some() {
            debug!(dir = %dir.display(), "folder not empty; stopping prune");
            break;
        }
        fs::remove_dir(&dir).map_err(|err| EditError::io("prune.remove", &dir, err))?;
        debug!(dir = %dir.display(), "pruned empty folder");
    }
    Ok(())
}

/// Every assessment in the course, as locations.
///
/// # Errors
///
/// Returns an error if a directory cannot be listed.
pub fn all_assessments(course: &Path) -> EditResult<Vec<AssessmentLocation>> {
    let mut locations = Vec::new();
    for course_instance in existing_ids(&instances_root(course), INSTANCE_DESCRIPTOR)? {
        let root = assessments_root(course, &course_instance);
        for tid in existing_ids(&root, ASSESSMENT_DESCRIPTOR)? {
            locations.push(AssessmentLocation {
                course_instance: course_instance.clone(),
                tid,
            });
        }
    }
    Ok(locations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    type TestResult<T> = Result<T>;

    fn touch(path: &Path) -> TestResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, "{}")?;
        Ok(())
    }

    #[test]
    fn existing_ids_recurse_until_descriptor() -> TestResult<()> {
        let dir = tempfile::tempdir()?;
        let root = dir.path().join("questions");
        touch(&root.join("q1/info.json"))?;
        touch(&root.join("topic/q2/info.json"))?;
        touch(&root.join("topic/q2/nested/info.json"))?;
        fs::create_dir_all(root.join("empty"))?;

        assert_eq!(existing_ids(&root, "info.json")?, vec!["q1", "topic/q2"]);
        assert!(existing_ids(&dir.path().join("missing"), "info.json")?.is_empty());
        Ok(())
    }

    #[test]
    fn taken_ids_include_directories_without_descriptors() -> TestResult<()> {
        let dir = tempfile::tempdir()?;
        let root = dir.path().join("questions");
        touch(&root.join("question-1/info.json"))?;
        touch(&root.join("topic/q2/info.json"))?;
        fs::create_dir_all(root.join("question-2"))?;
        fs::write(root.join("question-2/question.html"), "<p></p>")?;

        assert_eq!(
            taken_ids(&root, "info.json")?,
            vec!["question-1", "question-2", "topic", "topic/q2"]
        );
        assert!(taken_ids(&dir.path().join("missing"), "info.json")?.is_empty());
        Ok(())
    }

    #[test]
    fn existing_titles_skip_broken_descriptors() -> TestResult<()> {
        let dir = tempfile::tempdir()?;
        let root = dir.path();
        fs::create_dir_all(root.join("a"))?;
        fs::write(root.join("a/info.json"), r#"{"title": "Alpha"}"#)?;
        fs::create_dir_all(root.join("b"))?;
        fs::write(root.join("b/info.json"), "not json")?;
        assert_eq!(existing_titles(root, "info.json", "title")?, vec!["Alpha"]);
        Ok(())
    }

    #[test]
    fn copy_tree_copies_nested_files_and_refuses_overwrite() -> TestResult<()> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join("src");
        touch(&source.join("a/b/c.txt"))?;
        let destination = dir.path().join("dst");

        copy_tree(&source, &destination)?;
        assert!(destination.join("a/b/c.txt").is_file());
        assert!(matches!(
            copy_tree(&source, &destination),
            Err(EditError::MutationFailure {
                reason: "already_exists",
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn prune_removes_only_empty_parents() -> TestResult<()> {
        let dir = tempfile::tempdir()?;
        let root = dir.path();
        touch(&root.join("a/keep.txt"))?;
        fs::create_dir_all(root.join("a/b/c"))?;

        remove_empty_preceding_subfolders(root, "a/b/c/q1")?;
        assert!(!root.join("a/b").exists());
        assert!(root.join("a/keep.txt").exists());
        Ok(())
    }

    #[test]
    fn move_path_creates_parent_and_refuses_overwrite() -> TestResult<()> {
        let dir = tempfile::tempdir()?;
        touch(&dir.path().join("old/info.json"))?;
        touch(&dir.path().join("taken/info.json"))?;

        move_path(&dir.path().join("old"), &dir.path().join("deep/new"))?;
        assert!(dir.path().join("deep/new/info.json").is_file());
        assert!(move_path(&dir.path().join("deep/new"), &dir.path().join("taken")).is_err());
        Ok(())
    }

    #[test]
    fn remove_path_ignores_missing_targets() -> TestResult<()> {
        let dir = tempfile::tempdir()?;
        remove_path(&dir.path().join("nothing"))?;
        touch(&dir.path().join("x/y.txt"))?;
        remove_path(&dir.path().join("x"))?;
        assert!(!dir.path().join("x").exists());
        Ok(())
    }

    #[test]
    fn all_assessments_spans_instances() -> TestResult<()> {
        let dir = tempfile::tempdir()?;
        let course = dir.path();
        touch(&course.join("courseInstances/Fa23/infoCourseInstance.json"))?;
        touch(&course.join("courseInstances/Fa23/assessments/HW1/infoAssessment.json"))?;
        touch(&course.join("courseInstances/Sp24/infoCourseInstance.json"))?;
        touch(&course.join("courseInstances/Sp24/assessments/exams/E1/infoAssessment.json"))?;

        let locations = all_assessments(course)?;
        assert_eq!(locations.len(), 2);
        assert_eq!(locations[1].tid, "exams/E1");
        assert!(locations[1].descriptor_path(course).is_file());
        Ok(())
    }
}
