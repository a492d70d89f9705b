use crate::core::Chunk;
use crate::error::MetricsError;
use crate::metrics::stats;
use crate::metrics::Summary;

/// Two consecutive samples further apart than this many nominal periods
/// count as a discontinuity.
pub const GAP_TOLERANCE_PERIODS: f64 = 1.5;

/// Timing of one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleTiming {
    pub source: f64,
    /// Receive time of the chunk that carried the sample
    pub received: f64,
    /// `received - (n - 1 - i) / nominal_rate`
    pub estimated_received: f64,
}

impl SampleTiming {
    pub fn latency_ms(&self) -> f64 {
        (self.estimated_received - self.source) * 1000.0
    }
}

/// Per-sample timings in arrival order.
///
/// Only the chunk's receive time is observed; earlier samples in a chunk are
/// assumed to have been produced one nominal period apart, so the estimate
/// is only as good as the declared rate.
pub fn sample_timings(
    chunks: &[Chunk],
    nominal_rate_hz: f64,
) -> impl Iterator<Item = SampleTiming> + '_ {
    let period = 1.0 / nominal_rate_hz;
    chunks.iter().flat_map(move |chunk| {
        let n = chunk.len();
        let received = chunk.received_at();
        chunk.timestamps().iter().enumerate().map(move |(i, &source)| SampleTiming {
            source,
            received,
            estimated_received: received - (n - 1 - i) as f64 * period,
        })
    })
}

fn validate_rate(nominal_rate_hz: f64) -> Result<(), MetricsError> {
    if nominal_rate_hz.is_finite() && nominal_rate_hz > 0.0 {
        Ok(())
    } else {
        Err(MetricsError::InvalidNominalRate(nominal_rate_hz))
    }
}

/// Back-calculated latencies in milliseconds, one per sample.
pub fn sample_latencies_ms(chunks: &[Chunk], nominal_rate_hz: f64) -> Result<Vec<f64>, MetricsError> {
    validate_rate(nominal_rate_hz)?;
    Ok(sample_timings(chunks, nominal_rate_hz)
        .map(|t| t.latency_ms())
        .collect())
}

/// Reduces every chunk observed in a run to a [`Summary`].
///
/// Pure and deterministic. Degenerate input (no chunks, one sample, flat
/// timestamps) produces 0.0 for the affected statistics; the only error is a
/// nominal rate that is not a positive finite number.
pub fn compute_metrics(
    chunks: &[Chunk],
    nominal_rate_hz: f64,
    ring_drops: u64,
) -> Result<Summary, MetricsError> {
    validate_rate(nominal_rate_hz)?;
    let period = 1.0 / nominal_rate_hz;

    let timings: Vec<SampleTiming> = sample_timings(chunks, nominal_rate_hz).collect();
    let total_samples = timings.len();

    let mut summary = Summary {
        ring_drops,
        total_sample_count: total_samples as u64,
        total_chunk_count: chunks.len() as u64,
        ..Default::default()
    };

    if total_samples == 0 {
        return Ok(summary);
    }

    // Latency
    let latencies: Vec<f64> = timings.iter().map(SampleTiming::latency_ms).collect();
    let sorted = stats::sorted(&latencies);
    summary.p50_ms = stats::percentile_sorted(&sorted, 50.0);
    summary.p95_ms = stats::percentile_sorted(&sorted, 95.0);
    summary.p99_ms = stats::percentile_sorted(&sorted, 99.0);
    summary.max_latency_ms = sorted[sorted.len() - 1];
    summary.latency_mean_ms = stats::mean(&latencies);
    summary.latency_std_ms = stats::std_dev(&latencies);
    summary.latency_spread_ms = summary.p95_ms - summary.p50_ms;

    // Jitter over measured chunk arrivals; per-sample arrivals inside a chunk
    // are back-calculated and carry no timing information of their own
    let receives: Vec<f64> = chunks.iter().map(|c| c.received_at() * 1000.0).collect();
    let rr = stats::diffs(&receives);
    summary.jitter_std_ms = stats::std_dev(&rr);
    summary.jitter_cv = stats::coefficient_of_variation(&rr);

    // Rate and drops
    let (src_min, src_max) = timings.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| {
        (lo.min(t.source), hi.max(t.source))
    });
    let span = src_max - src_min;
    summary.observed_duration_s = span;
    if total_samples >= 2 && span > 0.0 {
        summary.effective_sample_rate_hz = total_samples as f64 / span;
    }
    let expected = nominal_rate_hz * span;
    summary.expected_sample_count = expected;
    if expected > 0.0 {
        let missing = (expected - total_samples as f64) / expected * 100.0;
        summary.drops_percentage = missing.clamp(0.0, 100.0);
    }

    // Drift: latency trend against source time
    let elapsed: Vec<f64> = timings.iter().map(|t| t.source - src_min).collect();
    summary.drift_ms_per_min = stats::linear_slope(&elapsed, &latencies) * 60.0;

    // Inter-sample intervals within chunks
    let isi: Vec<f64> = chunks
        .iter()
        .flat_map(|c| c.timestamps().windows(2).map(|w| (w[1] - w[0]) * 1000.0))
        .collect();
    let isi_sorted = stats::sorted(&isi);
    summary.isi_mean_ms = stats::mean(&isi);
    summary.isi_std_ms = stats::std_dev(&isi);
    summary.isi_p50_ms = stats::percentile_sorted(&isi_sorted, 50.0);
    summary.isi_p95_ms = stats::percentile_sorted(&isi_sorted, 95.0);
    summary.isi_p99_ms = stats::percentile_sorted(&isi_sorted, 99.0);

    // Receive intervals between chunks
    summary.rr_mean_ms = stats::mean(&rr);
    summary.rr_std_ms = stats::std_dev(&rr);

    // Ordering
    let max_gap = GAP_TOLERANCE_PERIODS * period;
    summary.sequence_discontinuities = timings
        .windows(2)
        .filter(|w| {
            let delta = w[1].source - w[0].source;
            delta < 0.0 || delta > max_gap
        })
        .count() as u64;
    summary.out_of_order_chunks = chunks
        .windows(2)
        .filter(|w| w[1].first_timestamp() < w[0].last_timestamp())
        .count() as u64;

    Ok(summary)
}
