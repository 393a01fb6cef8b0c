//! Git repository helpers and the availability check used to gate VC suites.

use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};

/// Identity used for fixture commits.
pub const FIXTURE_USER_NAME: &str = "Fixture Author";
/// Email used for fixture commits.
pub const FIXTURE_USER_EMAIL: &str = "fixture@example.com";

/// Returns `true` if a usable `git` executable is on the `PATH`.
#[must_use]
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Run `git` in `dir` and return its trimmed standard output.
///
/// # Errors
///
/// Returns an error if git cannot be started or exits non-zero.
pub fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(["-c", &format!("user.name={FIXTURE_USER_NAME}")])
        .args(["-c", &format!("user.email={FIXTURE_USER_EMAIL}")])
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("failed to run git {}", args.join(" ")))?;
    if !output.status.success() {
        bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Turn `course` into a clone of a fresh bare repository at `remote`.
///
/// Existing course content becomes the initial commit on `master`, which is
/// pushed with upstream tracking so a plain `git push` works afterwards.
///
/// # Errors
///
/// Returns an error if any git command fails.
pub fn init_course_repo(course: &Path, remote: &Path) -> Result<()> {
    std::fs::create_dir_all(remote)
        .with_context(|| format!("failed to create {}", remote.display()))?;
    run_git(remote, &["init", "--bare", "-q"])?;
    run_git(remote, &["symbolic-ref", "HEAD", "refs/heads/master"])?;

    run_git(course, &["init", "-q"])?;
    run_git(course, &["symbolic-ref", "HEAD", "refs/heads/master"])?;
    run_git(course, &["add", "-A"])?;
    run_git(course, &["commit", "-q", "-m", "initial course"])?;
    let remote = remote
        .to_str()
        .context("remote path is not valid UTF-8")?;
    run_git(course, &["remote", "add", "origin", remote])?;
    run_git(course, &["push", "-q", "-u", "origin", "master"])?;
    Ok(())
}

/// Number of commits reachable from `HEAD`.
///
/// # Errors
///
/// Returns an error if git fails or prints a non-numeric count.
pub fn commit_count(dir: &Path) -> Result<usize> {
    let count = run_git(dir, &["rev-list", "--count", "HEAD"])?;
    count
        .parse()
        .with_context(|| format!("unexpected commit count {count:?}"))
}

/// Subject line of the commit at `rev`.
///
/// # Errors
///
/// Returns an error if git fails.
pub fn commit_subject(dir: &Path, rev: &str) -> Result<String> {
    run_git(dir, &["log", "-1", "--format=%s", rev])
}
