#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Course content editing: mutation strategies for questions, assessments,
//! course instances and files, run through a locked, audited pipeline that
//! optionally mirrors every change into git.

pub mod descriptor;
pub mod error;
pub mod model;
pub mod names;
pub mod operation;
pub mod paths;
pub mod pipeline;
pub mod report;
pub mod strategy;
pub mod sync;
pub mod tree;
pub mod vcs;

pub use error::{EditError, EditResult, FailureKind};
pub use model::{Actor, CourseHandle, EditContext, FileContainer};
pub use operation::EditOperation;
pub use pipeline::{Collaborators, EditPipeline, PipelineSettings};
pub use report::{
    EditFailure, EditReport, EditStatus, PipelineState, PostCommitWarning, StateRecord, StepStatus,
};
pub use strategy::{EditStrategy, WriteOutcome};
pub use sync::{
    CodeCache, DescriptorAudit, DiskSynchronizer, MemoryRevisionStore, NullCodeCache,
    RevisionStore,
};
pub use tree::AssessmentLocation;
pub use vcs::GitCommands;
