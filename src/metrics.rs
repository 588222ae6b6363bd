//! In-process metrics for the search service.

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;

/// Latency samples kept per operation; older samples are dropped.
const SAMPLE_WINDOW: usize = 10_000;

/// Counters plus a sliding window of latency samples.
#[derive(Debug)]
pub struct MetricsCollector {
    total_queries: u64,
    total_ingests: u64,
    failed_requests: u64,
    query_latencies_us: VecDeque<u64>,
    ingest_latencies_us: VecDeque<u64>,
}

/// Latency distribution over the current sample window, in microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    pub samples: usize,
    pub avg_us: f64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
}

/// Point-in-time view of the collector, as served on `/metrics`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_queries: u64,
    pub total_ingests: u64,
    pub failed_requests: u64,
    pub query_latency: LatencySummary,
    pub ingest_latency: LatencySummary,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            total_queries: 0,
            total_ingests: 0,
            failed_requests: 0,
            query_latencies_us: VecDeque::new(),
            ingest_latencies_us: VecDeque::new(),
        }
    }

    /// Record a search, timed from request to ranked results.
    pub fn record_query(&mut self, elapsed: Duration) {
        self.total_queries += 1;
        push_sample(&mut self.query_latencies_us, elapsed);
    }

    /// Record a stored document, timed from raw text to durable insert.
    pub fn record_ingest(&mut self, elapsed: Duration) {
        self.total_ingests += 1;
        push_sample(&mut self.ingest_latencies_us, elapsed);
    }

    pub fn record_failure(&mut self) {
        self.failed_requests += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_queries: self.total_queries,
            total_ingests: self.total_ingests,
            failed_requests: self.failed_requests,
            query_latency: LatencySummary::from_samples(&self.query_latencies_us),
            ingest_latency: LatencySummary::from_samples(&self.ingest_latencies_us),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn push_sample(window: &mut VecDeque<u64>, elapsed: Duration) {
    if window.len() == SAMPLE_WINDOW {
        window.pop_front();
    }
    window.push_back(u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX));
}

impl LatencySummary {
    fn from_samples(samples: &VecDeque<u64>) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let mut sorted: Vec<u64> = samples.iter().copied().collect();
        sorted.sort_unstable();
        // Nearest-rank percentile over the sorted window.
        let rank = |p: f64| {
            let idx = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
            sorted[idx.min(sorted.len() - 1)]
        };

        Self {
            samples: sorted.len(),
            avg_us: sorted.iter().sum::<u64>() as f64 / sorted.len() as f64,
            p50_us: rank(50.0),
            p95_us: rank(95.0),
            p99_us: rank(99.0),
        }
    }
}
