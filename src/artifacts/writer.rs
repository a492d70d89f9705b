use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::MeasureSettings;
use crate::core::Chunk;
use crate::metrics::{sample_latencies_ms, sample_timings, Summary};
use crate::observability::ResourceUsage;
use crate::record::FlatRecord;
use crate::source::StreamInfo;

pub const LATENCY_FILE: &str = "latency.csv";
pub const TIMES_FILE: &str = "times.csv";
pub const SUMMARY_FILE: &str = "summary.json";

/// Run parameters recorded next to the summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunParameters {
    pub stream_key: String,
    pub stream_value: String,
    pub duration_seconds: f64,
    pub chunk_size: usize,
    pub nominal_sample_rate: f64,
    pub ring_capacity: usize,
}

impl From<&MeasureSettings> for RunParameters {
    fn from(settings: &MeasureSettings) -> Self {
        Self {
            stream_key: settings.stream_key.clone(),
            stream_value: settings.stream_value.clone(),
            duration_seconds: settings.duration_seconds,
            chunk_size: settings.chunk_size,
            nominal_sample_rate: settings.nominal_sample_rate,
            ring_capacity: settings.ring_capacity,
        }
    }
}

/// Paths of the files written for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub latency_csv: PathBuf,
    pub times_csv: PathBuf,
    pub summary_json: PathBuf,
}

/// Writes per-sample tables and the merged summary record into a directory.
pub struct ArtifactWriter {
    directory: PathBuf,
}

impl ArtifactWriter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn write_all(
        &self,
        chunks: &[Chunk],
        summary: &Summary,
        resources: Option<&ResourceUsage>,
        parameters: &RunParameters,
        stream: Option<&StreamInfo>,
    ) -> Result<ArtifactPaths> {
        std::fs::create_dir_all(&self.directory)
            .with_context(|| format!("Failed to create output directory {}", self.directory.display()))?;

        let paths = ArtifactPaths {
            latency_csv: self.directory.join(LATENCY_FILE),
            times_csv: self.directory.join(TIMES_FILE),
            summary_json: self.directory.join(SUMMARY_FILE),
        };

        write_latency_csv(&paths.latency_csv, chunks, parameters.nominal_sample_rate)?;
        write_times_csv(&paths.times_csv, chunks, parameters.nominal_sample_rate)?;

        let record = summary_record(summary, resources, parameters, stream)?;
        let file = create(&paths.summary_json)?;
        let mut out = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut out, &record)
            .with_context(|| format!("Failed to write {}", paths.summary_json.display()))?;
        writeln!(out)?;
        out.flush()?;

        tracing::info!(directory = %self.directory.display(), "artifacts written");
        Ok(paths)
    }
}

fn create(path: &Path) -> Result<File> {
    File::create(path).with_context(|| format!("Failed to create {}", path.display()))
}

/// One `latency_ms` row per sample.
pub fn write_latency_csv(path: &Path, chunks: &[Chunk], nominal_rate_hz: f64) -> Result<()> {
    let mut out = BufWriter::new(create(path)?);
    writeln!(out, "latency_ms")?;
    for latency in sample_latencies_ms(chunks, nominal_rate_hz)? {
        writeln!(out, "{}", latency)?;
    }
    out.flush()
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Source time, chunk receive time and estimated per-sample receive time.
pub fn write_times_csv(path: &Path, chunks: &[Chunk], nominal_rate_hz: f64) -> Result<()> {
    let mut out = BufWriter::new(create(path)?);
    writeln!(out, "src_time,recv_time,recv_time_est")?;
    for timing in sample_timings(chunks, nominal_rate_hz) {
        writeln!(
            out,
            "{},{},{}",
            timing.source, timing.received, timing.estimated_received
        )?;
    }
    out.flush()
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Summary fields at top level, resource averages merged in, plus
/// `environment`, `parameters` and `stream` sections.
pub fn summary_record(
    summary: &Summary,
    resources: Option<&ResourceUsage>,
    parameters: &RunParameters,
    stream: Option<&StreamInfo>,
) -> Result<Value> {
    let mut record = match serde_json::to_value(summary)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    if let Some(usage) = resources {
        for (name, value) in usage.fields() {
            record.insert(name.to_string(), Value::from(value));
        }
        record.insert(
            "system_per_core_percent_avg".to_string(),
            serde_json::to_value(&usage.system_per_core_percent_avg)?,
        );
    }

    record.insert("environment".to_string(), environment());
    record.insert("parameters".to_string(), serde_json::to_value(parameters)?);
    if let Some(info) = stream {
        record.insert("stream".to_string(), serde_json::to_value(info)?);
    }

    Ok(Value::Object(record))
}

fn environment() -> Value {
    serde_json::json!({
        "tool": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "os": std::env::consts::OS,
        "arch": std::env::consts::ARCH,
        "cpu_count": std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
    })
}
