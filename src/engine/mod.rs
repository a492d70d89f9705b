pub mod inlet;
pub mod measure;
pub mod state;

pub use inlet::{InletWorker, DEFAULT_PULL_TIMEOUT, DEFAULT_RESOLVE_TIMEOUT};
pub use measure::{run_measurement, run_measurement_until, MeasureOutcome, JOIN_TIMEOUT};
pub use state::WorkerStatus;
