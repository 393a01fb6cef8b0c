//! Generic file operations inside a [`FileContainer`].
//!
//! # Design
//! - Targets are resolved against the container root when relative and
//!   checked lexically, so `..` cannot escape the container.
//! - Summaries name paths relative to the container root.

use std::fs;
use std::path::{Path, PathBuf};

use quire_runtime::JobHandle;
use sha2::{Digest, Sha256};

use super::{EditStrategy, WriteOutcome};
use crate::error::{EditError, EditResult};
use crate::model::{EditContext, FileContainer};
use crate::paths;
use crate::tree;

/// Delete one file or directory.
#[derive(Debug, Clone)]
pub struct FileDelete {
    /// Area the target must lie in.
    pub container: FileContainer,
    /// Target, absolute or relative to the container root.
    pub path: PathBuf,
}

impl FileDelete {
    fn target(&self) -> PathBuf {
        resolve(&self.container.root, &self.path)
    }
}

impl EditStrategy for FileDelete {
    fn describe(&self) -> String {
        format!(
            "{}delete {}",
            self.container.summary_prefix(),
            paths::relative_display(&self.container.root, &self.target())
        )
    }

    fn can_edit(&self, _ctx: &EditContext) -> EditResult<()> {
        check_target(&self.container, "path", &self.target(), true)
    }

    fn write(&self, _ctx: &EditContext, job: &JobHandle) -> EditResult<WriteOutcome> {
        let target = self.target();
        job.log(format!("Remove {}", target.display()));
        tree::remove_path(&target)?;
        Ok(WriteOutcome::new(
            format!(
                "{}delete {}",
                self.container.summary_prefix(),
                paths::relative_display(&self.container.root, &target)
            ),
            vec![target],
        ))
    }
}

/// Move one file or directory within the container.
#[derive(Debug, Clone)]
pub struct FileRename {
    /// Area both paths must lie in.
    pub container: FileContainer,
    /// Current location.
    pub old_path: PathBuf,
    /// New location; missing parent directories are created.
    pub new_path: PathBuf,
}

impl FileRename {
    fn targets(&self) -> (PathBuf, PathBuf) {
        (
            resolve(&self.container.root, &self.old_path),
            resolve(&self.container.root, &self.new_path),
        )
    }

    fn summary(&self, prefix: &str) -> String {
        let (old_path, new_path) = self.targets();
        format!(
            "{prefix}rename {} to {}",
            paths::relative_display(&self.container.root, &old_path),
            paths::relative_display(&self.container.root, &new_path)
        )
    }
}

impl EditStrategy for FileRename {
    fn describe(&self) -> String {
        self.summary(&self.container.summary_prefix())
    }

    fn can_edit(&self, _ctx: &EditContext) -> EditResult<()> {
        let (old_path, new_path) = self.targets();
        check_target(&self.container, "old_path", &old_path, true)?;
        check_target(&self.container, "new_path", &new_path, true)
    }

    fn write(&self, _ctx: &EditContext, job: &JobHandle) -> EditResult<WriteOutcome> {
        let (old_path, new_path) = self.targets();
        job.log(format!(
            "Move {} to {}",
            old_path.display(),
            new_path.display()
        ));
        tree::move_path(&old_path, &new_path)?;
        Ok(WriteOutcome::new(
            self.summary(&self.container.summary_prefix()),
            vec![old_path, new_path],
        ))
    }
}

/// Write uploaded bytes to one file.
#[derive(Clone)]
pub struct FileUpload {
    /// Area the target must lie in.
    pub container: FileContainer,
    /// Target, absolute or relative to the container root.
    pub path: PathBuf,
    /// Raw file contents.
    pub contents: Vec<u8>,
}

impl std::fmt::Debug for FileUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileUpload")
            .field("container", &self.container)
            .field("path", &self.path)
            .field("contents_len", &self.contents.len())
            .finish()
    }
}

impl FileUpload {
    fn target(&self) -> PathBuf {
        resolve(&self.container.root, &self.path)
    }
}

impl EditStrategy for FileUpload {
    fn describe(&self) -> String {
        format!(
            "{}upload {}",
            self.container.summary_prefix(),
            paths::relative_display(&self.container.root, &self.target())
        )
    }

    fn can_edit(&self, _ctx: &EditContext) -> EditResult<()> {
        check_target(&self.container, "path", &self.target(), false)
    }

    fn should_edit(&self, _ctx: &EditContext) -> EditResult<bool> {
        let target = self.target();
        match fs::read(&target) {
            Ok(existing) => Ok(digest(&existing) != digest(&self.contents)),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(source) => Err(EditError::io("file.digest", target, source)),
        }
    }

    fn write(&self, _ctx: &EditContext, job: &JobHandle) -> EditResult<WriteOutcome> {
        let target = self.target();
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| EditError::io("file.create_parent", parent, source))?;
        }
        job.log(format!(
            "Write {} bytes to {}",
            self.contents.len(),
            target.display()
        ));
        fs::write(&target, &self.contents)
            .map_err(|source| EditError::io("file.write", &target, source))?;
        Ok(WriteOutcome::new(
            format!(
                "{}upload {}",
                self.container.summary_prefix(),
                paths::relative_display(&self.container.root, &target)
            ),
            vec![target],
        ))
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn check_target(
    container: &FileContainer,
    field: &'static str,
    target: &Path,
    check_immovable: bool,
) -> EditResult<()> {
    let shown = target.display().to_string();
    if !paths::contains(&container.root, target)
        || paths::normalize(target) == paths::normalize(&container.root)
    {
        return Err(EditError::invalid(field, shown, "outside_container"));
    }
    if paths::contained_in_any(&container.invalid_roots, target).is_some() {
        return Err(EditError::invalid(field, shown, "reserved_directory"));
    }
    if check_immovable {
        let normalized = paths::normalize(target);
        if container
            .immovable
            .iter()
            .any(|path| paths::normalize(path) == normalized)
        {
            return Err(EditError::invalid(field, shown, "immovable"));
        }
    }
    Ok(())
}

fn digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
