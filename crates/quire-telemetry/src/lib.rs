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

//! Telemetry primitives shared across the Quire workspace.
//!
//! Layout: `init.rs` (subscriber installation, format selection, session span),
//! `metrics.rs` (Prometheus registry for edit pipeline counters).

pub mod init;
pub mod metrics;

pub use init::{LogFormat, LoggingConfig, build_sha, init_logging, session_span};
pub use metrics::{Metrics, MetricsSnapshot};
