//! Course tree fixtures backed by temporary directories.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Value, json};
use tempfile::TempDir;

/// A throwaway course directory with helpers for laying out content.
///
/// The course lives in `<tempdir>/course`; sibling directories (for example a
/// bare git remote) can be created under [`CourseFixture::scratch`].
pub struct CourseFixture {
    dir: TempDir,
    course: PathBuf,
}

impl CourseFixture {
    /// Create an empty course with a minimal `infoCourse.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new() -> Result<Self> {
        let fixture = Self::bare()?;
        fixture.write_json(
            "infoCourse.json",
            &json!({
                "uuid": "00000000-0000-4000-8000-000000000001",
                "name": "TEST 101",
                "title": "Test Course",
            }),
        )?;
        Ok(fixture)
    }

    /// Create an empty course directory without any descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn bare() -> Result<Self> {
        let dir = tempfile::tempdir().context("failed to create fixture tempdir")?;
        let course = dir.path().join("course");
        fs::create_dir_all(&course).context("failed to create course dir")?;
        Ok(Self { dir, course })
    }

    /// Course root.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.course
    }

    /// Path to a sibling location outside the course root.
    #[must_use]
    pub fn scratch(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write raw bytes at `rel`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_file(&self, rel: &str, contents: impl AsRef<[u8]>) -> Result<PathBuf> {
        let path = self.course.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Write a JSON document at `rel` with four-space indentation.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_json(&self, rel: &str, value: &Value) -> Result<PathBuf> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        serde::Serialize::serialize(value, &mut serializer)?;
        out.push(b'\n');
        self.write_file(rel, out)
    }

    /// Read and parse the JSON document at `rel`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or malformed.
    pub fn read_json(&self, rel: &str) -> Result<Value> {
        let path = self.course.join(rel);
        let raw =
            fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Add a question with a descriptor and a body file.
    ///
    /// # Errors
    ///
    /// Returns an error if the files cannot be written.
    pub fn add_question(&self, qid: &str, uuid: &str, title: &str) -> Result<PathBuf> {
        self.write_json(
            &format!("questions/{qid}/info.json"),
            &json!({
                "uuid": uuid,
                "title": title,
                "topic": "Fixtures",
                "type": "v3",
            }),
        )?;
        self.write_file(
            &format!("questions/{qid}/question.html"),
            format!("<p>{title}</p>\n"),
        )?;
        Ok(self.course.join("questions").join(qid))
    }

    /// Add a course instance descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn add_instance(&self, ciid: &str, uuid: &str, long_name: &str) -> Result<PathBuf> {
        self.write_json(
            &format!("courseInstances/{ciid}/infoCourseInstance.json"),
            &json!({
                "uuid": uuid,
                "longName": long_name,
                "allowAccess": [],
            }),
        )?;
        Ok(self.course.join("courseInstances").join(ciid))
    }

    /// Add an assessment whose single zone lists `questions`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn add_assessment(
        &self,
        ciid: &str,
        tid: &str,
        uuid: &str,
        title: &str,
        questions: &[&str],
    ) -> Result<PathBuf> {
        let questions: Vec<Value> = questions.iter().map(|id| json!({ "id": id })).collect();
        self.write_json(
            &format!("courseInstances/{ciid}/assessments/{tid}/infoAssessment.json"),
            &json!({
                "uuid": uuid,
                "type": "Homework",
                "title": title,
                "set": "Homework",
                "number": "1",
                "allowAccess": [],
                "zones": [{ "questions": questions }],
            }),
        )?;
        Ok(self
            .course
            .join("courseInstances")
            .join(ciid)
            .join("assessments")
            .join(tid))
    }
}
