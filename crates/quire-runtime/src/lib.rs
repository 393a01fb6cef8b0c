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

//! Runtime primitives for course edits: job sequence recording, named course
//! locks, and child process execution with streamed output.

pub mod error;
pub mod jobs;
pub mod locks;
pub mod process;

pub use error::{RuntimeError, RuntimeResult};
pub use jobs::{
    JobCompletion, JobHandle, JobRecord, JobRecorder, JobSequence, JobSink, JobSpec, JobStatus,
    JobStore, SequenceId, SequenceMeta, SequenceStatus,
};
pub use locks::{FileLocks, InProcessLocks, LockManager, LockToken};
pub use process::{ProcessCommand, ProcessOutput, ProcessRunner, TokioProcessRunner};
