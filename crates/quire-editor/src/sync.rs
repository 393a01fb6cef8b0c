//! Collaborators invoked once an edit is durable.
//!
//! # Design
//! - The database mirror, the question server code cache and the revision
//!   store live outside this crate; the pipeline sees them only through these
//!   traits.
//! - The local implementations keep a standalone editor useful: the audit
//!   re-reads every descriptor so a broken write surfaces in the job log.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use quire_runtime::JobHandle;
use tracing::{error, info};

use crate::descriptor;
use crate::error::{EditError, EditResult};
use crate::tree::{self, COURSE_DESCRIPTOR, INSTANCE_DESCRIPTOR, QUESTION_DESCRIPTOR};

/// Re-reads the course tree into the database mirror.
#[async_trait]
pub trait DiskSynchronizer: Send + Sync {
    /// Resynchronize `course_id` from the tree at `course_path`.
    async fn resync(&self, course_path: &Path, course_id: &str, job: &JobHandle) -> EditResult<()>;
}

/// Invalidates cached question server code.
#[async_trait]
pub trait CodeCache: Send + Sync {
    /// Drop cached code for the course at `course_path`.
    async fn invalidate(&self, course_path: &Path, job: &JobHandle) -> EditResult<()>;
}

/// Stores the head revision of each course.
#[async_trait]
pub trait RevisionStore: Send + Sync {
    /// Record `hash` as the head revision of `course_id`.
    async fn record(&self, course_id: &str, hash: &str) -> EditResult<()>;

    /// Last recorded head revision of `course_id`.
    async fn get(&self, course_id: &str) -> EditResult<Option<String>>;
}

/// Synchronizer that parses every descriptor and reports entity counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptorAudit;

impl DescriptorAudit {
    fn audit(course_path: &Path, job: &JobHandle) -> EditResult<()> {
        let course_descriptor = course_path.join(COURSE_DESCRIPTOR);
        if course_descriptor.is_file() {
            descriptor::read(&course_descriptor)?;
        } else {
            job.log(format!("Missing {COURSE_DESCRIPTOR}"));
        }

        let questions_root = tree::questions_root(course_path);
        let questions = tree::existing_ids(&questions_root, QUESTION_DESCRIPTOR)?;
        for qid in &questions {
            descriptor::read(&questions_root.join(tree::id_path(qid)).join(QUESTION_DESCRIPTOR))?;
        }

        let instances_root = tree::instances_root(course_path);
        let instances = tree::existing_ids(&instances_root, INSTANCE_DESCRIPTOR)?;
        for ciid in &instances {
            descriptor::read(&instances_root.join(tree::id_path(ciid)).join(INSTANCE_DESCRIPTOR))?;
        }

        let assessments = tree::all_assessments(course_path)?;
        for location in &assessments {
            descriptor::read(&location.descriptor_path(course_path))?;
        }

        job.log(format!(
            "Found {} questions, {} course instances and {} assessments",
            questions.len(),
            instances.len(),
            assessments.len()
        ));
        Ok(())
    }
}

#[async_trait]
impl DiskSynchronizer for DescriptorAudit {
    async fn resync(&self, course_path: &Path, course_id: &str, job: &JobHandle) -> EditResult<()> {
        job.log(format!("Loading course from {}", course_path.display()));
        let result = Self::audit(course_path, job);
        match &result {
            Ok(()) => info!(course_id = %course_id, "course descriptors audited"),
            Err(err) => error!(
                course_id = %course_id,
                error = %err,
                "course descriptor audit failed"
            ),
        }
        result
    }
}

/// Cache for deployments without question servers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCodeCache;

#[async_trait]
impl CodeCache for NullCodeCache {
    async fn invalidate(&self, course_path: &Path, job: &JobHandle) -> EditResult<()> {
        job.log(format!(
            "No question server code cached for {}",
            course_path.display()
        ));
        Ok(())
    }
}

/// Revision store held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryRevisionStore {
    revisions: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryRevisionStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        match self.revisions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("revision store mutex poisoned; continuing with recovered guard");
                poisoned.into_inner()
            }
        }
    }
}

#[async_trait]
impl RevisionStore for MemoryRevisionStore {
    async fn record(&self, course_id: &str, hash: &str) -> EditResult<()> {
        if hash.is_empty() {
            return Err(EditError::Collaborator {
                component: "revision_store",
                detail: format!("empty revision for course {course_id}"),
            });
        }
        self.lock().insert(course_id.to_string(), hash.to_string());
        Ok(())
    }

    async fn get(&self, course_id: &str) -> EditResult<Option<String>> {
        Ok(self.lock().get(course_id).cloned())
    }
}
