//! Serving metrics: match latency and outcome counts.

use std::collections::VecDeque;
use std::time::Duration;

/// Latency samples kept for averages and percentiles.
pub const DEFAULT_LATENCY_WINDOW: usize = 10_000;

/// Collects runtime metrics for the match endpoint.
///
/// Counters cover the whole server lifetime; latency statistics cover the
/// most recent `window` matches.
#[derive(Debug)]
pub struct MetricsCollector {
    match_latencies_us: VecDeque<f64>,
    window: usize,
    total_matches: u64,
    unknown_matches: u64,
    failed_requests: u64,
    reloads: u64,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::with_window(DEFAULT_LATENCY_WINDOW)
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(window: usize) -> Self {
        let window = window.max(1);
        Self {
            match_latencies_us: VecDeque::with_capacity(window.min(DEFAULT_LATENCY_WINDOW)),
            window,
            total_matches: 0,
            unknown_matches: 0,
            failed_requests: 0,
            reloads: 0,
        }
    }

    /// Record a completed match and how long extraction plus scan took.
    pub fn record_match(&mut self, duration: Duration, unknown: bool) {
        self.total_matches += 1;
        if unknown {
            self.unknown_matches += 1;
        }
        if self.match_latencies_us.len() == self.window {
            self.match_latencies_us.pop_front();
        }
        self.match_latencies_us.push_back(duration.as_micros() as f64);
    }

    pub fn record_failure(&mut self) {
        self.failed_requests += 1;
    }

    pub fn record_reload(&mut self) {
        self.reloads += 1;
    }

    pub fn total_matches(&self) -> u64 {
        self.total_matches
    }

    pub fn unknown_matches(&self) -> u64 {
        self.unknown_matches
    }

    pub fn failed_requests(&self) -> u64 {
        self.failed_requests
    }

    pub fn reloads(&self) -> u64 {
        self.reloads
    }

    /// Average match latency in microseconds.
    pub fn avg_latency_us(&self) -> f64 {
        if self.match_latencies_us.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.match_latencies_us.iter().sum();
        sum / self.match_latencies_us.len() as f64
    }

    /// Get a percentile of match latency (e.g., 50.0, 95.0, 99.0).
    pub fn percentile_latency_us(&self, percentile: f64) -> f64 {
        if self.match_latencies_us.is_empty() {
            return 0.0;
        }

        let mut sorted: Vec<f64> = self.match_latencies_us.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let index = ((percentile / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        sorted[index.min(sorted.len() - 1)]
    }
}
