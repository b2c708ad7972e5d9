//! Prometheus metrics for Docent Gateway
//!
//! Exposes metrics for monitoring chat throughput, context compaction, and
//! provider health.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge_vec, register_histogram,
    register_histogram_vec, Counter, CounterVec, GaugeVec, Histogram, HistogramVec,
};

lazy_static! {
    // ============================================================================
    // Chat Turn Metrics
    // ============================================================================

    /// Total chat turns handled
    pub static ref CHAT_TURNS_TOTAL: Counter =
        register_counter!("docent_chat_turns_total", "Total chat turns handled").unwrap();

    /// Turns that crossed the summarization threshold
    pub static ref CONTEXT_COMPACTIONS_TOTAL: Counter = register_counter!(
        "docent_context_compactions_total",
        "Chat turns that crossed the summarization threshold"
    ).unwrap();

    /// Prompt size distribution, in estimated tokens
    pub static ref PROMPT_TOKENS: Histogram = register_histogram!(
        "docent_prompt_tokens",
        "Assembled prompt size in estimated tokens",
        vec![256.0, 512.0, 1024.0, 2048.0, 4096.0, 8192.0, 16384.0, 32768.0]
    ).unwrap();

    // ============================================================================
    // Provider Metrics
    // ============================================================================

    /// Completion requests by provider
    pub static ref COMPLETION_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "docent_completion_requests_total",
        "Total completion requests",
        &["provider"]
    ).unwrap();

    /// Completion errors by provider
    pub static ref COMPLETION_ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "docent_completion_errors_total",
        "Completion request failures",
        &["provider"]
    ).unwrap();

    /// Completion latency by provider
    pub static ref COMPLETION_LATENCY: HistogramVec = register_histogram_vec!(
        "docent_completion_latency_seconds",
        "Completion request latency in seconds",
        &["provider"],
        vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
    ).unwrap();

    // ============================================================================
    // Ingestion Metrics
    // ============================================================================

    /// Documentation sections ingested
    pub static ref SECTIONS_INDEXED_TOTAL: Counter = register_counter!(
        "docent_sections_indexed_total",
        "Documentation sections ingested"
    ).unwrap();

    // ============================================================================
    // System Metrics
    // ============================================================================

    /// Build info
    pub static ref BUILD_INFO: GaugeVec =
        register_gauge_vec!("docent_build_info", "Build information", &["version", "commit"]).unwrap();
}

/// Initialize metrics with build info
pub fn init_metrics() {
    BUILD_INFO
        .with_label_values(&[
            env!("CARGO_PKG_VERSION"),
            option_env!("GIT_COMMIT_SHA").unwrap_or("unknown"),
        ])
        .set(1.0);
}

/// Export metrics in Prometheus format
pub fn export() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_can_be_exported() {
        CHAT_TURNS_TOTAL.inc();
        SECTIONS_INDEXED_TOTAL.inc();

        let exported = export();
        assert!(exported.contains("docent_chat_turns_total"));
        assert!(exported.contains("docent_sections_indexed_total"));
    }
}
