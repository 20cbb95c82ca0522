// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory metrics: counters, gauges, and bounded histograms.
//!
//! The store is an explicit dependency owned by the composition root,
//! never a module-level singleton. Histograms keep the most recent
//! window of samples and compute percentiles over a sorted copy on
//! demand, which is cheap at the collection sizes involved.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Samples retained per histogram.
pub const HISTOGRAM_WINDOW: usize = 1000;

#[derive(Debug, Default)]
struct MetricsInner {
    counters: BTreeMap<String, u64>,
    gauges: BTreeMap<String, f64>,
    histograms: BTreeMap<String, Histogram>,
}

#[derive(Debug)]
struct Histogram {
    samples: VecDeque<f64>,
    count: u64,
    sum: f64,
}

impl Histogram {
    fn new() -> Self {
        Self { samples: VecDeque::with_capacity(HISTOGRAM_WINDOW), count: 0, sum: 0.0 }
    }

    fn record(&mut self, value: f64) {
        if self.samples.len() == HISTOGRAM_WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
        self.count += 1;
        self.sum += value;
    }

    fn summarize(&self) -> HistogramSummary {
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        HistogramSummary {
            count: self.count,
            sum: self.sum,
            min: sorted.first().copied(),
            max: sorted.last().copied(),
            p50: percentile(&sorted, 0.50),
            p95: percentile(&sorted, 0.95),
            p99: percentile(&sorted, 0.99),
        }
    }
}

/// Nearest-rank percentile over an ascending-sorted slice.
fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (p * sorted.len() as f64).ceil() as usize;
    let index = rank.clamp(1, sorted.len()) - 1;
    Some(sorted[index])
}

/// Counters, gauges, and bounded histograms behind one lock.
#[derive(Debug, Default)]
pub struct MetricsStore {
    inner: Mutex<MetricsInner>,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&self, name: &str) {
        self.incr_by(name, 1);
    }

    pub fn incr_by(&self, name: &str, by: u64) {
        let mut inner = self.inner.lock();
        *inner.counters.entry(name.to_string()).or_insert(0) += by;
    }

    pub fn set_gauge(&self, name: &str, value: f64) {
        self.inner.lock().gauges.insert(name.to_string(), value);
    }

    /// Record one histogram sample (e.g. a latency in milliseconds).
    pub fn observe(&self, name: &str, value: f64) {
        let mut inner = self.inner.lock();
        inner.histograms.entry(name.to_string()).or_insert_with(Histogram::new).record(value);
    }

    /// Immutable view of every metric, suitable for rendering.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock();
        MetricsSnapshot {
            counters: inner.counters.clone(),
            gauges: inner.gauges.clone(),
            histograms: inner.histograms.iter().map(|(k, v)| (k.clone(), v.summarize())).collect(),
        }
    }
}

/// Point-in-time view of the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, f64>,
    pub histograms: BTreeMap<String, HistogramSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistogramSummary {
    pub count: u64,
    pub sum: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub p50: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

impl MetricsSnapshot {
    /// Render in the text exposition format (one `name value` per line,
    /// histogram quantiles as `name{quantile="…"}`).
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.counters {
            out.push_str(&format!("{name} {value}\n"));
        }
        for (name, value) in &self.gauges {
            out.push_str(&format!("{name} {value}\n"));
        }
        for (name, summary) in &self.histograms {
            out.push_str(&format!("{name}_count {}\n", summary.count));
            out.push_str(&format!("{name}_sum {}\n", summary.sum));
            for (q, v) in [("0.5", summary.p50), ("0.95", summary.p95), ("0.99", summary.p99)] {
                if let Some(v) = v {
                    out.push_str(&format!("{name}{{quantile=\"{q}\"}} {v}\n"));
                }
            }
        }
        out
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
