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

//! File and environment backed configuration for the course editor.
//!
//! Layout: `model.rs` (typed settings), `defaults.rs` (default values and
//! environment variable names), `validate.rs` (checks and parsers),
//! `loader.rs` (document + environment merge), `error.rs`.

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load, load_with_env};
pub use model::{EditorConfig, LoggingSettings};
pub use validate::validate;
