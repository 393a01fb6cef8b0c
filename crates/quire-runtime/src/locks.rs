//! Named exclusive locks with a bounded wait.
//!
//! # Design
//! - One lock per name; names are opaque strings such as `coursedir:/srv/course`.
//! - Acquisition waits at most the caller's timeout and then fails with
//!   [`RuntimeError::LockTimeout`].
//! - Release consumes the token, so a token can be released at most once.
//! - [`InProcessLocks`] serializes tasks of one process; [`FileLocks`] adds an
//!   advisory lock file per name so separate processes exclude each other too.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use fs2::FileExt;
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{RuntimeError, RuntimeResult};

/// Delay between attempts on a contended lock file.
const LOCK_FILE_POLL: Duration = Duration::from_millis(25);

/// Proof of a held lock.
#[derive(Debug)]
pub struct LockToken {
    name: String,
    id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
    file: Option<File>,
}

impl LockToken {
    /// Token for a lock held by an external manager that tracks ownership itself.
    #[must_use]
    pub fn external(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: Uuid::new_v4(),
            guard: None,
            file: None,
        }
    }

    /// Lock name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unique id of this acquisition.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }
}

/// Lock service used by the edit pipeline.
#[async_trait]
pub trait LockManager: Send + Sync {
    /// Acquire `name`, waiting at most `timeout`.
    async fn acquire(&self, name: &str, timeout: Duration) -> RuntimeResult<LockToken>;

    /// Release a previously acquired lock.
    async fn release(&self, token: LockToken) -> RuntimeResult<()>;
}

/// Lock manager backed by per-name async mutexes in this process.
#[derive(Clone, Default)]
pub struct InProcessLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl InProcessLocks {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `name` is currently held.
    #[must_use]
    pub fn is_locked(&self, name: &str) -> bool {
        self.table()
            .get(name)
            .is_some_and(|lock| lock.try_lock().is_err())
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("lock table mutex poisoned; continuing with recovered guard");
                poisoned.into_inner()
            }
        }
    }

    fn entry(&self, name: &str) -> Arc<AsyncMutex<()>> {
        Arc::clone(
            self.table()
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    /// Drop the entry for `name` once no holder or waiter references it.
    fn prune(&self, name: &str) {
        let mut table = self.table();
        if table
            .get(name)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            table.remove(name);
        }
    }
}

#[async_trait]
impl LockManager for InProcessLocks {
    async fn acquire(&self, name: &str, timeout: Duration) -> RuntimeResult<LockToken> {
        let lock = self.entry(name);
        let started = Instant::now();
        if let Ok(guard) = tokio::time::timeout(timeout, lock.lock_owned()).await {
            let token = LockToken {
                name: name.to_string(),
                id: Uuid::new_v4(),
                guard: Some(guard),
                file: None,
            };
            debug!(lock = name, token = %token.id, "lock acquired");
            Ok(token)
        } else {
            self.prune(name);
            let waited_ms = elapsed_ms(started);
            debug!(lock = name, waited_ms, "lock acquisition timed out");
            Err(RuntimeError::LockTimeout {
                name: name.to_string(),
                waited_ms,
            })
        }
    }

    async fn release(&self, mut token: LockToken) -> RuntimeResult<()> {
        let Some(guard) = token.guard.take() else {
            return Err(RuntimeError::LockRelease {
                name: token.name,
                reason: "token_not_owned",
            });
        };
        drop(guard);
        self.prune(&token.name);
        debug!(lock = %token.name, token = %token.id, "lock released");
        Ok(())
    }
}

/// Lock manager that pairs the in-process table with an exclusive advisory
/// lock on `<dir>/<sha256(name)>.lock`.
///
/// Every manager pointed at the same directory contends for the same files,
/// whether it lives in this process or another one. Lock files are left in
/// place after release.
#[derive(Clone)]
pub struct FileLocks {
    dir: PathBuf,
    local: InProcessLocks,
}

impl FileLocks {
    /// Manager keeping its lock files in `dir`, created on first use.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            local: InProcessLocks::new(),
        }
    }

    /// Lock file used for `name`.
    #[must_use]
    pub fn lock_path(&self, name: &str) -> PathBuf {
        self.dir
            .join(format!("{:x}.lock", Sha256::digest(name.as_bytes())))
    }

    async fn lock_file(&self, name: &str, path: &Path) -> RuntimeResult<File> {
        fs::create_dir_all(&self.dir).map_err(|source| RuntimeError::LockFile {
            name: name.to_string(),
            path: self.dir.clone(),
            source,
        })?;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|source| RuntimeError::LockFile {
                name: name.to_string(),
                path: path.to_path_buf(),
                source,
            })?;
        let contended = fs2::lock_contended_error().raw_os_error();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(file),
                Err(err) if err.raw_os_error() == contended => {
                    tokio::time::sleep(LOCK_FILE_POLL).await;
                }
                Err(source) => {
                    return Err(RuntimeError::LockFile {
                        name: name.to_string(),
                        path: path.to_path_buf(),
                        source,
                    });
                }
            }
        }
    }

    async fn abandon(&self, token: LockToken) {
        let name = token.name.clone();
        if let Err(err) = self.local.release(token).await {
            warn!(lock = %name, error = %err, "failed to release in-process lock");
        }
    }
}

#[async_trait]
impl LockManager for FileLocks {
    async fn acquire(&self, name: &str, timeout: Duration) -> RuntimeResult<LockToken> {
        let started = Instant::now();
        let mut token = self.local.acquire(name, timeout).await?;
        let path = self.lock_path(name);
        let remaining = timeout.saturating_sub(started.elapsed());
        match tokio::time::timeout(remaining, self.lock_file(name, &path)).await {
            Ok(Ok(file)) => {
                token.file = Some(file);
                debug!(lock = name, path = %path.display(), token = %token.id, "lock file acquired");
                Ok(token)
            }
            Ok(Err(err)) => {
                self.abandon(token).await;
                Err(err)
            }
            Err(_) => {
                self.abandon(token).await;
                let waited_ms = elapsed_ms(started);
                debug!(lock = name, path = %path.display(), waited_ms, "lock file acquisition timed out");
                Err(RuntimeError::LockTimeout {
                    name: name.to_string(),
                    waited_ms,
                })
            }
        }
    }

    async fn release(&self, mut token: LockToken) -> RuntimeResult<()> {
        let Some(file) = token.file.take() else {
            return Err(RuntimeError::LockRelease {
                name: token.name,
                reason: "token_not_owned",
            });
        };
        let unlocked = FileExt::unlock(&file).map_err(|source| RuntimeError::LockFile {
            name: token.name.clone(),
            path: self.lock_path(&token.name),
            source,
        });
        drop(file);
        self.local.release(token).await?;
        unlocked
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    type TestResult<T> = Result<T>;

    #[tokio::test]
    async fn second_acquire_times_out_while_held() -> TestResult<()> {
        let locks = InProcessLocks::new();
        let token = locks
            .acquire("coursedir:/srv/a", Duration::from_millis(50))
            .await?;
        assert!(locks.is_locked("coursedir:/srv/a"));

        let err = locks
            .acquire("coursedir:/srv/a", Duration::from_millis(20))
            .await
            .err();
        assert!(matches!(err, Some(RuntimeError::LockTimeout { .. })));

        locks.release(token).await?;
        assert!(!locks.is_locked("coursedir:/srv/a"));
        let again = locks
            .acquire("coursedir:/srv/a", Duration::from_millis(20))
            .await?;
        locks.release(again).await?;
        Ok(())
    }

    #[tokio::test]
    async fn distinct_names_do_not_contend() -> TestResult<()> {
        let locks = InProcessLocks::new();
        let first = locks.acquire("coursedir:/a", Duration::from_millis(20)).await?;
        let second = locks.acquire("coursedir:/b", Duration::from_millis(20)).await?;
        locks.release(first).await?;
        locks.release(second).await?;
        Ok(())
    }

    #[tokio::test]
    async fn waiter_proceeds_after_release() -> TestResult<()> {
        let locks = InProcessLocks::new();
        let token = locks.acquire("coursedir:/c", Duration::from_millis(20)).await?;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire("coursedir:/c", Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        locks.release(token).await?;
        let acquired = waiter.await??;
        assert_eq!(acquired.name(), "coursedir:/c");
        locks.release(acquired).await?;
        Ok(())
    }

    #[tokio::test]
    async fn released_names_leave_the_table() -> TestResult<()> {
        let locks = InProcessLocks::new();
        let token = locks.acquire("coursedir:/e", Duration::from_millis(20)).await?;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire("coursedir:/e", Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        locks.release(token).await?;
        let acquired = waiter.await??;
        assert_eq!(locks.table().len(), 1);

        locks.release(acquired).await?;
        assert!(locks.table().is_empty());

        let held = locks.acquire("coursedir:/f", Duration::from_millis(20)).await?;
        let timed_out = locks.acquire("coursedir:/f", Duration::from_millis(10)).await;
        assert!(timed_out.is_err());
        assert_eq!(locks.table().len(), 1);
        locks.release(held).await?;
        assert!(locks.table().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn separate_file_managers_exclude_each_other() -> TestResult<()> {
        let dir = tempfile::tempdir()?;
        let first = FileLocks::new(dir.path().join("locks"));
        let second = FileLocks::new(dir.path().join("locks"));
        let name = "coursedir:/srv/course";

        let token = first.acquire(name, Duration::from_millis(50)).await?;
        assert!(first.lock_path(name).is_file());
        let err = second.acquire(name, Duration::from_millis(80)).await.err();
        assert!(matches!(err, Some(RuntimeError::LockTimeout { .. })));

        let waiter = {
            let second = second.clone();
            tokio::spawn(async move { second.acquire(name, Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        first.release(token).await?;
        let acquired = waiter.await??;
        assert_eq!(acquired.name(), name);
        second.release(acquired).await?;

        let again = first.acquire(name, Duration::from_millis(50)).await?;
        first.release(again).await?;
        Ok(())
    }

    #[tokio::test]
    async fn file_managers_do_not_contend_across_names() -> TestResult<()> {
        let dir = tempfile::tempdir()?;
        let locks = FileLocks::new(dir.path());
        assert_ne!(locks.lock_path("coursedir:/a"), locks.lock_path("coursedir:/b"));
        assert_eq!(locks.lock_path("coursedir:/a"), locks.lock_path("coursedir:/a"));

        let first = locks.acquire("coursedir:/a", Duration::from_millis(20)).await?;
        let second = locks.acquire("coursedir:/b", Duration::from_millis(20)).await?;
        locks.release(first).await?;
        locks.release(second).await?;
        Ok(())
    }

    #[tokio::test]
    async fn file_managers_reject_foreign_tokens() -> TestResult<()> {
        let dir = tempfile::tempdir()?;
        let locks = FileLocks::new(dir.path());
        let err = locks.release(LockToken::external("coursedir:/g")).await.err();
        assert!(matches!(
            err,
            Some(RuntimeError::LockRelease {
                reason: "token_not_owned",
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn external_tokens_cannot_be_released_here() {
        let locks = InProcessLocks::new();
        let err = locks.release(LockToken::external("coursedir:/d")).await.err();
        assert!(matches!(
            err,
            Some(RuntimeError::LockRelease {
                reason: "token_not_owned",
                ..
            })
        ));
    }
}
