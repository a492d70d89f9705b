use streamprobe::core::Chunk;
use streamprobe::error::MetricsError;
use streamprobe::metrics::{compute_metrics, sample_latencies_ms, Summary};
use streamprobe::record::FlatRecord;

/// `count` contiguous chunks of `size` samples at `rate`, each received
/// `delay` seconds after its last sample.
fn regular_chunks(rate: f64, size: usize, count: usize, delay: f64) -> Vec<Chunk> {
    (0..count)
        .map(|k| {
            let ts: Vec<f64> = (0..size)
                .map(|i| (k * size + i) as f64 / rate)
                .collect();
            let recv = ts[size - 1] + delay;
            Chunk::new(k as u64, ts, recv).unwrap()
        })
        .collect()
}

fn assert_all_finite(summary: &Summary) {
    for (name, value) in summary.fields() {
        assert!(value.is_finite(), "{} is not finite: {}", name, value);
    }
}

#[test]
fn test_empty_input_yields_sentinels() {
    let summary = compute_metrics(&[], 1000.0, 4).unwrap();

    assert_eq!(summary.total_sample_count, 0);
    assert_eq!(summary.total_chunk_count, 0);
    assert_eq!(summary.ring_drops, 4);
    assert_eq!(summary.p50_ms, 0.0);
    assert_eq!(summary.p99_ms, 0.0);
    assert_eq!(summary.max_latency_ms, 0.0);
    assert_eq!(summary.effective_sample_rate_hz, 0.0);
    assert_eq!(summary.drops_percentage, 0.0);
    assert_eq!(summary.drift_ms_per_min, 0.0);
    assert_all_finite(&summary);
}

#[test]
fn test_single_sample_percentiles_equal_its_latency() {
    let chunk = Chunk::new(0, vec![1.0], 1.02).unwrap();
    let summary = compute_metrics(&[chunk], 500.0, 0).unwrap();

    let latency = 20.0;
    assert!((summary.p50_ms - latency).abs() < 1e-6);
    assert!((summary.p95_ms - latency).abs() < 1e-6);
    assert!((summary.p99_ms - latency).abs() < 1e-6);
    assert!((summary.max_latency_ms - latency).abs() < 1e-6);
    assert_eq!(summary.latency_spread_ms, 0.0);
    assert_eq!(summary.effective_sample_rate_hz, 0.0);
    assert_eq!(summary.drops_percentage, 0.0);
    assert_eq!(summary.drift_ms_per_min, 0.0);
    assert_eq!(summary.isi_mean_ms, 0.0);
    assert_eq!(summary.rr_mean_ms, 0.0);
    assert_eq!(summary.total_sample_count, 1);
    assert_all_finite(&summary);
}

#[test]
fn test_end_to_end_regular_stream() {
    let chunks = regular_chunks(256.0, 32, 10, 0.005);
    let summary = compute_metrics(&chunks, 256.0, 0).unwrap();

    assert_eq!(summary.total_sample_count, 320);
    assert_eq!(summary.total_chunk_count, 10);
    let rate_error = (summary.effective_sample_rate_hz - 256.0).abs() / 256.0;
    assert!(rate_error < 0.01, "effective rate {}", summary.effective_sample_rate_hz);
    assert_eq!(summary.drops_percentage, 0.0);
    assert_eq!(summary.sequence_discontinuities, 0);
    assert_eq!(summary.out_of_order_chunks, 0);

    assert!((summary.p50_ms - 5.0).abs() < 1e-6);
    assert!((summary.max_latency_ms - 5.0).abs() < 1e-6);
    assert!(summary.jitter_std_ms < 1e-6);
    assert!((summary.rr_mean_ms - 125.0).abs() < 1e-6);
    assert!(summary.rr_std_ms < 1e-6);
    assert!((summary.isi_mean_ms - 1000.0 / 256.0).abs() < 1e-6);
    assert!(summary.drift_ms_per_min.abs() < 1e-6);
}

/// Like `regular_chunks`, but receive times alternate `swing` seconds early
/// and late around a 30 ms base delay.
fn swinging_chunks(rate: f64, size: usize, count: usize, swing: f64) -> Vec<Chunk> {
    (0..count)
        .map(|k| {
            let ts: Vec<f64> = (0..size)
                .map(|i| (k * size + i) as f64 / rate)
                .collect();
            let offset = if k % 2 == 0 { swing } else { -swing };
            let recv = ts[size - 1] + 0.030 + offset;
            Chunk::new(k as u64, ts, recv).unwrap()
        })
        .collect()
}

#[test]
fn test_jitter_tracks_receive_irregularity_not_chunk_size() {
    // 41 chunks -> 40 receive deltas alternating period - 40 ms, period + 40 ms
    for size in [8usize, 64] {
        let chunks = swinging_chunks(256.0, size, 41, 0.020);
        let summary = compute_metrics(&chunks, 256.0, 0).unwrap();

        let period_ms = size as f64 / 256.0 * 1000.0;
        assert!(
            (summary.jitter_std_ms - 40.0).abs() < 1e-6,
            "chunk {}: jitter {}",
            size,
            summary.jitter_std_ms
        );
        assert!((summary.jitter_std_ms - summary.rr_std_ms).abs() < 1e-9);
        assert!((summary.jitter_cv - 40.0 / period_ms).abs() < 1e-6);
    }
}

#[test]
fn test_regular_stream_has_zero_jitter_cv() {
    let chunks = regular_chunks(1000.0, 16, 20, 0.002);
    let summary = compute_metrics(&chunks, 1000.0, 0).unwrap();

    assert!(summary.jitter_std_ms < 1e-6);
    assert!(summary.jitter_cv < 1e-6);
}

#[test]
fn test_drift_slope_recovery() {
    // 10 minutes, one 32-sample chunk every 5 s, offset rising 2 ms/min
    let rate = 256.0;
    let chunks: Vec<Chunk> = (0..120)
        .map(|k| {
            let start = k as f64 * 5.0;
            let ts: Vec<f64> = (0..32).map(|i| start + i as f64 / rate).collect();
            let last = ts[31];
            let recv = last + 0.010 + 2e-3 * (last / 60.0);
            Chunk::new(k, ts, recv).unwrap()
        })
        .collect();

    let summary = compute_metrics(&chunks, rate, 0).unwrap();
    assert!(
        (summary.drift_ms_per_min - 2.0).abs() <= 0.2,
        "drift {}",
        summary.drift_ms_per_min
    );
}

#[test]
fn test_missing_chunk_counts_as_drop_and_gap() {
    let mut chunks = regular_chunks(256.0, 32, 3, 0.005);
    chunks.remove(1);

    let summary = compute_metrics(&chunks, 256.0, 1).unwrap();
    assert_eq!(summary.ring_drops, 1);
    assert_eq!(summary.sequence_discontinuities, 1);
    // 64 seen out of 256 * 95/256 expected
    assert!((summary.drops_percentage - 31.0 / 95.0 * 100.0).abs() < 1e-6);
}

#[test]
fn test_drop_percentage_is_bounded() {
    // Two samples 100 s apart at 1 kHz: almost everything missing
    let sparse = vec![
        Chunk::new(0, vec![0.0], 0.01).unwrap(),
        Chunk::new(1, vec![100.0], 100.01).unwrap(),
    ];
    let summary = compute_metrics(&sparse, 1000.0, 0).unwrap();
    assert!(summary.drops_percentage > 99.0);
    assert!(summary.drops_percentage <= 100.0);

    // More samples than the nominal rate accounts for
    let dense = regular_chunks(1000.0, 50, 4, 0.001);
    let summary = compute_metrics(&dense, 10.0, 0).unwrap();
    assert_eq!(summary.drops_percentage, 0.0);
}

#[test]
fn test_identical_timestamps_do_not_divide_by_zero() {
    let chunks = vec![
        Chunk::new(0, vec![5.0, 5.0, 5.0], 5.1).unwrap(),
        Chunk::new(1, vec![5.0, 5.0], 5.2).unwrap(),
    ];
    let summary = compute_metrics(&chunks, 100.0, 0).unwrap();

    assert_eq!(summary.observed_duration_s, 0.0);
    assert_eq!(summary.effective_sample_rate_hz, 0.0);
    assert_eq!(summary.drops_percentage, 0.0);
    assert_eq!(summary.drift_ms_per_min, 0.0);
    assert_eq!(summary.sequence_discontinuities, 0);
    assert_all_finite(&summary);
}

#[test]
fn test_non_divisible_rate_is_tolerated() {
    let chunks = regular_chunks(333.3, 7, 9, 0.002);
    let summary = compute_metrics(&chunks, 333.3, 0).unwrap();

    assert_eq!(summary.sequence_discontinuities, 0);
    assert_eq!(summary.drops_percentage, 0.0);
    assert!((summary.p50_ms - 2.0).abs() < 1e-6);
    assert_all_finite(&summary);
}

#[test]
fn test_out_of_order_chunks_are_counted() {
    let chunks = vec![
        Chunk::new(0, vec![1.0, 1.01], 1.02).unwrap(),
        Chunk::new(1, vec![0.5, 0.51], 1.03).unwrap(),
    ];
    let summary = compute_metrics(&chunks, 100.0, 0).unwrap();

    assert_eq!(summary.out_of_order_chunks, 1);
    assert_eq!(summary.sequence_discontinuities, 1);
}

#[test]
fn test_isi_statistics_within_chunks_only() {
    let chunks = vec![
        Chunk::new(0, vec![0.0, 0.001, 0.003], 0.004).unwrap(),
        Chunk::new(1, vec![10.0], 10.001).unwrap(),
    ];
    let summary = compute_metrics(&chunks, 1000.0, 0).unwrap();

    assert!((summary.isi_mean_ms - 1.5).abs() < 1e-9);
    assert!((summary.isi_std_ms - 0.5).abs() < 1e-9);
    assert!((summary.isi_p50_ms - 1.5).abs() < 1e-9);
    assert!((summary.rr_mean_ms - 9997.0).abs() < 1e-6);
    assert_eq!(summary.rr_std_ms, 0.0);
}

#[test]
fn test_invalid_nominal_rate_is_the_only_error() {
    let chunks = regular_chunks(100.0, 4, 2, 0.0);

    assert_eq!(
        compute_metrics(&chunks, 0.0, 0),
        Err(MetricsError::InvalidNominalRate(0.0))
    );
    assert!(compute_metrics(&chunks, f64::NAN, 0).is_err());
    assert!(sample_latencies_ms(&chunks, -5.0).is_err());
}

#[test]
fn test_sample_latencies_match_summary() {
    let chunks = regular_chunks(200.0, 10, 3, 0.003);
    let latencies = sample_latencies_ms(&chunks, 200.0).unwrap();

    assert_eq!(latencies.len(), 30);
    assert!(latencies.iter().all(|l| (l - 3.0).abs() < 1e-6));
}

#[test]
fn test_compute_is_deterministic() {
    let chunks = regular_chunks(512.0, 16, 20, 0.004);
    let a = compute_metrics(&chunks, 512.0, 2).unwrap();
    let b = compute_metrics(&chunks, 512.0, 2).unwrap();
    assert_eq!(a, b);
}
