use serde::{Deserialize, Serialize};

use crate::record::FlatRecord;

/// Timing-quality summary of one measurement run.
///
/// All durations are milliseconds unless the field name says otherwise.
/// Inputs too small for a statistic yield 0.0 rather than NaN.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FlatRecord)]
pub struct Summary {
    // Back-calculated per-sample latency
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub max_latency_ms: f64,
    pub latency_mean_ms: f64,
    pub latency_std_ms: f64,
    /// p95 - p50
    pub latency_spread_ms: f64,

    /// Std of consecutive chunk receive deltas
    pub jitter_std_ms: f64,
    pub jitter_cv: f64,

    pub effective_sample_rate_hz: f64,
    /// Source timestamp span (last - first)
    pub observed_duration_s: f64,
    pub expected_sample_count: f64,
    pub drops_percentage: f64,
    pub ring_drops: u64,

    pub drift_ms_per_min: f64,

    pub total_sample_count: u64,
    pub total_chunk_count: u64,

    // Within-chunk inter-sample intervals
    pub isi_mean_ms: f64,
    pub isi_std_ms: f64,
    pub isi_p50_ms: f64,
    pub isi_p95_ms: f64,
    pub isi_p99_ms: f64,

    // Chunk-to-chunk receive intervals
    pub rr_mean_ms: f64,
    pub rr_std_ms: f64,

    pub sequence_discontinuities: u64,
    pub out_of_order_chunks: u64,
}
