//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters and gauges the edit pipeline reports.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    edit_steps_total: IntCounterVec,
    edits_total: IntCounterVec,
    events_emitted_total: IntCounterVec,
    lock_wait_ms: IntGauge,
}

/// Snapshot of selected counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Edits that finished with a durable change.
    pub edits_succeeded: u64,
    /// Edits that terminated in failure.
    pub edits_failed: u64,
    /// Edits skipped before locking because they would not change anything.
    pub edits_unchanged: u64,
    /// Latest time spent waiting for a course lock (ms).
    pub lock_wait_ms: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let edit_steps_total = IntCounterVec::new(
            Opts::new("edit_steps_total", "Edit pipeline steps executed by status"),
            &["step", "status"],
        )?;
        let edits_total = IntCounterVec::new(
            Opts::new("edits_total", "Edit requests by terminal outcome"),
            &["outcome"],
        )?;
        let events_emitted_total = IntCounterVec::new(
            Opts::new("events_emitted_total", "Domain events emitted by type"),
            &["type"],
        )?;
        let lock_wait_ms = IntGauge::with_opts(Opts::new(
            "course_lock_wait_ms",
            "Time spent waiting for the most recent course lock (ms)",
        ))?;

        registry.register(Box::new(edit_steps_total.clone()))?;
        registry.register(Box::new(edits_total.clone()))?;
        registry.register(Box::new(events_emitted_total.clone()))?;
        registry.register(Box::new(lock_wait_ms.clone()))?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                edit_steps_total,
                edits_total,
                events_emitted_total,
                lock_wait_ms,
            }),
        })
    }

    /// Increment the pipeline step counter.
    pub fn inc_edit_step(&self, step: &str, status: &str) {
        self.inner
            .edit_steps_total
            .with_label_values(&[step, status])
            .inc();
    }

    /// Increment the terminal outcome counter (`success`, `failure`, `unchanged`, `rejected`).
    pub fn inc_edit(&self, outcome: &str) {
        self.inner.edits_total.with_label_values(&[outcome]).inc();
    }

    /// Increment the emitted event counter for the specific event type.
    pub fn inc_event(&self, event_type: &str) {
        self.inner
            .events_emitted_total
            .with_label_values(&[event_type])
            .inc();
    }

    /// Record how long the latest lock acquisition waited.
    pub fn observe_lock_wait(&self, duration: Duration) {
        self.inner.lock_wait_ms.set(Self::duration_to_ms(duration));
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("failed to encode Prometheus metrics")?;
        String::from_utf8(buffer).context("metrics output was not valid UTF-8")
    }

    /// Take a point-in-time snapshot of the edit counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let outcome = |label: &str| self.inner.edits_total.with_label_values(&[label]).get();
        MetricsSnapshot {
            edits_succeeded: outcome("success"),
            edits_failed: outcome("failure"),
            edits_unchanged: outcome("unchanged"),
            lock_wait_ms: self.inner.lock_wait_ms.get(),
        }
    }

    /// Current value of a step counter, mainly for assertions.
    #[must_use]
    pub fn edit_step_count(&self, step: &str, status: &str) -> u64 {
        self.inner
            .edit_steps_total
            .with_label_values(&[step, status])
            .get()
    }

    /// Convert a duration to milliseconds saturating at `i64::MAX`.
    pub(crate) fn duration_to_ms(duration: Duration) -> i64 {
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }
}
