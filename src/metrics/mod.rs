pub mod compute;
pub mod stats;
pub mod summary;

pub use compute::{compute_metrics, sample_latencies_ms, sample_timings, SampleTiming, GAP_TOLERANCE_PERIODS};
pub use summary::Summary;
