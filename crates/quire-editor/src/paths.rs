//! Lexical path containment checks.
//!
//! Nothing here touches the filesystem: `.` and `..` components are resolved
//! textually so a check gives the same answer before and after a mutation.

use std::path::{Component, Path, PathBuf};

/// Resolve `.` and `..` components without consulting the filesystem.
///
/// Leading `..` components of a relative path are preserved; `..` at the root of
/// an absolute path is dropped.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let last = out.components().next_back();
                match last {
                    Some(Component::Normal(_)) => {
                        out.pop();
                    }
                    Some(Component::RootDir | Component::Prefix(_)) => {}
                    _ => out.push(".."),
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Whether `path` lies inside `root` (or is `root`).
///
/// True iff the path relative to `root` neither climbs out through `..` nor is
/// absolute. An absolute path is never inside a relative root and vice versa.
#[must_use]
pub fn contains(root: &Path, path: &Path) -> bool {
    let root = normalize(root);
    let path = normalize(path);
    if root.is_absolute() != path.is_absolute() {
        return false;
    }
    path.starts_with(&root)
}

/// First entry of `roots` that contains `path`.
#[must_use]
pub fn contained_in_any<'a>(roots: &'a [PathBuf], path: &Path) -> Option<&'a Path> {
    roots
        .iter()
        .map(PathBuf::as_path)
        .find(|root| contains(root, path))
}

/// Whether `name` is usable as a single directory entry name.
#[must_use]
pub fn is_single_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// Whether `id` is a non-empty relative identifier made only of plain components,
/// such as `topic/q1`.
#[must_use]
pub fn is_relative_id(id: &str) -> bool {
    !id.is_empty()
        && !id.contains(['\\', '\0'])
        && Path::new(id)
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}

/// `path` relative to `root`, rendered with `/` separators.
#[must_use]
pub fn relative_display(root: &Path, path: &Path) -> String {
    let root = normalize(root);
    let path = normalize(path);
    path.strip_prefix(&root).map_or_else(
        |_| path.display().to_string(),
        |relative| {
            relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        },
    )
}
