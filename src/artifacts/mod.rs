pub mod writer;

pub use writer::{ArtifactPaths, ArtifactWriter, RunParameters, LATENCY_FILE, SUMMARY_FILE, TIMES_FILE};
