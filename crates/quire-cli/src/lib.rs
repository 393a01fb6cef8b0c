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
#![allow(clippy::redundant_pub_crate)]

//! Command-line front end for editing a course checkout.
//!
//! Layout:
//! - `cli.rs`: argument parsing, error type and command dispatch
//! - `context.rs`: configuration, actor and pipeline wiring
//! - `commands/`: command handlers grouped by concern
//! - `output.rs`: renderers for reports and job sequences
//! - `main.rs`: thin entrypoint delegating to `run()`

pub(crate) mod cli;
pub(crate) mod commands;
pub(crate) mod context;
pub(crate) mod output;

pub use cli::run;
