use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Monotonic seconds since the first call in this process.
///
/// Source timestamps from in-process streams and all receive stamps share
/// this time domain, so latencies are directly comparable.
pub fn local_clock() -> f64 {
    EPOCH.get_or_init(Instant::now).elapsed().as_secs_f64()
}
