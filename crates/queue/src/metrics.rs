// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue-side metrics recording.
//!
//! Thin wrapper over the shared [`MetricsStore`] fixing the metric
//! names: per-operation latency histograms and counters, plus the four
//! derived gauges the operator surface renders.

use sb_core::{MetricsSnapshot, MetricsStore};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct QueueMetrics {
    store: Arc<MetricsStore>,
}

impl QueueMetrics {
    pub fn new(store: Arc<MetricsStore>) -> Self {
        Self { store }
    }

    /// Record one completed queue operation: latency sample + counter.
    pub fn record_op(&self, op: &str, started: Instant, finished: Instant) {
        let elapsed_ms = finished.duration_since(started).as_secs_f64() * 1000.0;
        self.store.observe(&format!("queue.{op}.latency_ms"), elapsed_ms);
        self.store.incr(&format!("queue.{op}.count"));
    }

    pub fn count_recovered(&self, count: usize) {
        self.store.incr_by("queue.recovered", count as u64);
    }

    pub fn set_gauges(
        &self,
        queue_size: usize,
        backlog_age_seconds: u64,
        disk_usage_mb: f64,
        jobs_per_hour: f64,
    ) {
        self.store.set_gauge("queue_size", queue_size as f64);
        self.store.set_gauge("backlog_age_seconds", backlog_age_seconds as f64);
        self.store.set_gauge("disk_usage_mb", disk_usage_mb);
        self.store.set_gauge("jobs_per_hour", jobs_per_hour);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.store.snapshot()
    }
}
