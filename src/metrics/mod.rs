//! Prometheus metrics for reference resolution
//!
//! Request-level counters and histograms are recorded by
//! [`crate::resolver::QuerySession`]; the candidate scan records how many
//! uploads it inspected and how many passed their bloom filter.

use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ============================================================================
    // Request metrics
    // ============================================================================

    /// Total number of page requests
    pub static ref RESOLVE_REQUESTS: Counter = Counter::with_opts(
        Opts::new(
            "xrefs_resolve_requests_total",
            "Total number of page requests"
        )
    ).expect("Failed to create RESOLVE_REQUESTS counter");

    /// Page requests that returned an error
    pub static ref RESOLVE_ERRORS: Counter = Counter::with_opts(
        Opts::new(
            "xrefs_resolve_errors_total",
            "Page requests that returned an error"
        )
    ).expect("Failed to create RESOLVE_ERRORS counter");

    /// Page request latency in seconds
    pub static ref RESOLVE_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "xrefs_resolve_latency_seconds",
            "Page request latency in seconds"
        ).buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0])
    ).expect("Failed to create RESOLVE_LATENCY histogram");

    /// Number of locations returned per page
    pub static ref RESOLVE_LOCATIONS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "xrefs_resolve_locations_count",
            "Number of locations returned per page"
        ).buckets(vec![0.0, 1.0, 10.0, 50.0, 100.0, 500.0, 1000.0])
    ).expect("Failed to create RESOLVE_LOCATIONS histogram");

    // ============================================================================
    // Remote search metrics
    // ============================================================================

    /// Candidate batches selected from the candidate scan
    pub static ref REMOTE_BATCHES: Counter = Counter::with_opts(
        Opts::new(
            "xrefs_remote_batches_total",
            "Candidate batches selected from the candidate scan"
        )
    ).expect("Failed to create REMOTE_BATCHES counter");

    /// Candidate uploads read from the candidate scan
    pub static ref CANDIDATES_SCANNED: Counter = Counter::with_opts(
        Opts::new(
            "xrefs_candidates_scanned_total",
            "Candidate uploads read from the candidate scan"
        )
    ).expect("Failed to create CANDIDATES_SCANNED counter");

    /// Candidate uploads whose bloom filter matched a moniker
    pub static ref FILTER_HITS: Counter = Counter::with_opts(
        Opts::new(
            "xrefs_filter_hits_total",
            "Candidate uploads whose bloom filter matched a moniker"
        )
    ).expect("Failed to create FILTER_HITS counter");
}

/// Register all metrics with the global registry
///
/// Call once at startup; registering twice reports a duplicate collector.
pub fn register_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(RESOLVE_REQUESTS.clone()))?;
    REGISTRY.register(Box::new(RESOLVE_ERRORS.clone()))?;
    REGISTRY.register(Box::new(RESOLVE_LATENCY.clone()))?;
    REGISTRY.register(Box::new(RESOLVE_LOCATIONS.clone()))?;
    REGISTRY.register(Box::new(REMOTE_BATCHES.clone()))?;
    REGISTRY.register(Box::new(CANDIDATES_SCANNED.clone()))?;
    REGISTRY.register(Box::new(FILTER_HITS.clone()))?;
    Ok(())
}

/// Gather all metrics and encode them in Prometheus text format
///
/// Returns an empty string if encoding fails.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Metrics contained invalid UTF-8: {}", e);
        String::new()
    })
}

/// Current metric values in a human-readable form, for `resolve --metrics`.
pub struct MetricSnapshot {
    pub requests_total: f64,
    pub errors_total: f64,
    pub latency_avg: f64,
    pub locations_avg: f64,
    pub remote_batches_total: f64,
    pub candidates_scanned_total: f64,
    pub filter_hits_total: f64,
}

impl MetricSnapshot {
    /// Capture the current state of all metrics
    pub fn capture() -> Self {
        Self {
            requests_total: RESOLVE_REQUESTS.get(),
            errors_total: RESOLVE_ERRORS.get(),
            latency_avg: calculate_histogram_avg(&RESOLVE_LATENCY),
            locations_avg: calculate_histogram_avg(&RESOLVE_LOCATIONS),
            remote_batches_total: REMOTE_BATCHES.get(),
            candidates_scanned_total: CANDIDATES_SCANNED.get(),
            filter_hits_total: FILTER_HITS.get(),
        }
    }

    /// Share of scanned candidates that passed their filter.
    pub fn filter_hit_ratio(&self) -> f64 {
        if self.candidates_scanned_total == 0.0 {
            return 0.0;
        }
        self.filter_hits_total / self.candidates_scanned_total
    }
}

/// Calculate the average value from a histogram
fn calculate_histogram_avg(histogram: &Histogram) -> f64 {
    let count = histogram.get_sample_count();
    if count == 0 {
        return 0.0;
    }
    histogram.get_sample_sum() / count as f64
}
