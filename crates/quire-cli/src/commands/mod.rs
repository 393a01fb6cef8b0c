//! Command handlers grouped by concern.

pub(crate) mod edit;
pub(crate) mod jobs;
