use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::Args;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::buffers::MAX_RING_CAPACITY;
use crate::error::ConfigError;
use crate::resilience::RetryStrategy;
use crate::source::mock::SYNTHETIC_KIND;
use crate::source::Selector;

/// Flags for `streamprobe measure`. Every flag can also come from a
/// `STREAMPROBE_*` environment variable; the flag wins.
#[derive(Debug, Clone, Default, Args)]
pub struct MeasureArgs {
    /// TOML or JSON settings file (top level or a [measure] table)
    #[arg(long, env = "STREAMPROBE_SETTINGS_FILE")]
    pub settings_file: Option<PathBuf>,

    /// Stream property to match (name, type, source_id, ...)
    #[arg(long, env = "STREAMPROBE_STREAM_KEY")]
    pub stream_key: Option<String>,

    #[arg(long, env = "STREAMPROBE_STREAM_VALUE")]
    pub stream_value: Option<String>,

    /// Measurement duration in seconds
    #[arg(long, env = "STREAMPROBE_DURATION_SECONDS")]
    pub duration_seconds: Option<f64>,

    /// Maximum samples per pull
    #[arg(long, env = "STREAMPROBE_CHUNK_SIZE")]
    pub chunk_size: Option<usize>,

    /// Declared sampling rate of the stream in Hz
    #[arg(long, env = "STREAMPROBE_NOMINAL_SAMPLE_RATE")]
    pub nominal_sample_rate: Option<f64>,

    #[arg(long, env = "STREAMPROBE_OUTPUT_DIRECTORY")]
    pub output_directory: Option<PathBuf>,

    #[arg(long, env = "STREAMPROBE_PRINT_SUMMARY", value_parser = BoolishValueParser::new(), num_args = 0..=1, default_missing_value = "true")]
    pub print_summary: Option<bool>,

    #[arg(long, env = "STREAMPROBE_VERBOSE_SUMMARY", value_parser = BoolishValueParser::new(), num_args = 0..=1, default_missing_value = "true")]
    pub verbose_summary: Option<bool>,

    /// Also print the summary as one line of JSON
    #[arg(long, env = "STREAMPROBE_JSON_SUMMARY", value_parser = BoolishValueParser::new(), num_args = 0..=1, default_missing_value = "true")]
    pub json_summary: Option<bool>,

    #[arg(long, env = "STREAMPROBE_RING_CAPACITY")]
    pub ring_capacity: Option<usize>,

    #[arg(long, env = "STREAMPROBE_PULL_TIMEOUT_MS")]
    pub pull_timeout_ms: Option<u64>,

    #[arg(long, env = "STREAMPROBE_RESOLVE_TIMEOUT_SECONDS")]
    pub resolve_timeout_seconds: Option<f64>,

    #[arg(long, env = "STREAMPROBE_DRAIN_BATCH")]
    pub drain_batch: Option<usize>,

    #[arg(long, env = "STREAMPROBE_DRAIN_INTERVAL_MS")]
    pub drain_interval_ms: Option<u64>,

    /// Default tracing filter when RUST_LOG is unset
    #[arg(long, env = "STREAMPROBE_LOG_LEVEL")]
    pub log_level: Option<String>,
}

/// Settings as read from a file; anything absent falls through to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSettings {
    pub stream_key: Option<String>,
    pub stream_value: Option<String>,
    pub duration_seconds: Option<f64>,
    pub chunk_size: Option<usize>,
    pub nominal_sample_rate: Option<f64>,
    pub output_directory: Option<PathBuf>,
    #[serde(default, deserialize_with = "boolish")]
    pub print_summary: Option<bool>,
    #[serde(default, deserialize_with = "boolish")]
    pub verbose_summary: Option<bool>,
    #[serde(default, deserialize_with = "boolish")]
    pub json_summary: Option<bool>,
    pub ring_capacity: Option<usize>,
    pub pull_timeout_ms: Option<u64>,
    pub resolve_timeout_seconds: Option<f64>,
    pub drain_batch: Option<usize>,
    pub drain_interval_ms: Option<u64>,
    pub log_level: Option<String>,
    pub retry: Option<RetryStrategy>,
    pub sources: Option<BTreeMap<String, Value>>,
}

/// Accepts real booleans as well as the usual yes/no spellings.
fn boolish<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Bool(b)) => Ok(Some(b)),
        Some(Raw::Int(i)) => Ok(Some(i != 0)),
        Some(Raw::Text(s)) => parse_bool(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid boolean: {}", s))),
    }
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

impl FileSettings {
    /// Load a `.toml` or `.json` settings file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::MissingFile(path.to_path_buf()));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let document: Value = match extension.as_deref() {
            Some("toml") => {
                let parsed: toml::Value = toml::from_str(&text).map_err(|source| ConfigError::Toml {
                    path: path.to_path_buf(),
                    source,
                })?;
                serde_json::to_value(parsed).map_err(|source| ConfigError::Json {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            Some("json") => serde_json::from_str(&text).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };

        Self::from_document(document).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Use the `measure` table when present, otherwise the whole document.
    pub fn from_document(mut document: Value) -> Result<Self, serde_json::Error> {
        let has_section = document.get("measure").is_some_and(Value::is_object);
        let section = if has_section {
            document["measure"].take()
        } else {
            document
        };
        serde_json::from_value(section)
    }
}

/// Fully resolved settings for one measurement run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasureSettings {
    pub stream_key: String,
    pub stream_value: String,
    pub duration_seconds: f64,
    pub chunk_size: usize,
    pub nominal_sample_rate: f64,
    pub output_directory: PathBuf,
    pub print_summary: bool,
    pub verbose_summary: bool,
    pub json_summary: bool,
    pub ring_capacity: usize,
    pub pull_timeout_ms: u64,
    pub resolve_timeout_seconds: f64,
    pub drain_batch: usize,
    pub drain_interval_ms: u64,
    pub log_level: String,
    pub retry: RetryStrategy,
    pub sources: BTreeMap<String, Value>,
}

impl Default for MeasureSettings {
    fn default() -> Self {
        let mut sources = BTreeMap::new();
        sources.insert(SYNTHETIC_KIND.to_string(), Value::Object(Default::default()));

        Self {
            stream_key: "type".to_string(),
            stream_value: "EEG".to_string(),
            duration_seconds: 10.0,
            chunk_size: 32,
            nominal_sample_rate: 1000.0,
            output_directory: PathBuf::from("results/run_001"),
            print_summary: true,
            verbose_summary: false,
            json_summary: false,
            ring_capacity: 256,
            pull_timeout_ms: 100,
            resolve_timeout_seconds: 5.0,
            drain_batch: 16,
            drain_interval_ms: 10,
            log_level: "info".to_string(),
            retry: RetryStrategy::default(),
            sources,
        }
    }
}

impl MeasureSettings {
    /// Merge flags/environment over the settings file over defaults, then
    /// validate.
    pub fn resolve(args: &MeasureArgs) -> Result<Self, ConfigError> {
        let file = match &args.settings_file {
            Some(path) => FileSettings::load(path)?,
            None => FileSettings::default(),
        };
        let settings = Self::default().merge_file(file).merge_args(args);
        settings.validate()?;
        Ok(settings)
    }

    pub fn merge_file(mut self, file: FileSettings) -> Self {
        macro_rules! take {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = file.$field { self.$field = value; })*
            };
        }
        take!(
            stream_key,
            stream_value,
            duration_seconds,
            chunk_size,
            nominal_sample_rate,
            output_directory,
            print_summary,
            verbose_summary,
            json_summary,
            ring_capacity,
            pull_timeout_ms,
            resolve_timeout_seconds,
            drain_batch,
            drain_interval_ms,
            log_level,
            retry,
            sources,
        );
        self
    }

    pub fn merge_args(mut self, args: &MeasureArgs) -> Self {
        macro_rules! take {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = &args.$field { self.$field = value.clone(); })*
            };
        }
        take!(
            stream_key,
            stream_value,
            duration_seconds,
            chunk_size,
            nominal_sample_rate,
            output_directory,
            print_summary,
            verbose_summary,
            json_summary,
            ring_capacity,
            pull_timeout_ms,
            resolve_timeout_seconds,
            drain_batch,
            drain_interval_ms,
            log_level,
        );
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.into(),
            }
        }
        fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(invalid(field, format!("must be a positive number, got {}", value)))
            }
        }

        if self.stream_key.trim().is_empty() {
            return Err(invalid("stream_key", "must not be empty"));
        }
        if self.stream_value.trim().is_empty() {
            return Err(invalid("stream_value", "must not be empty"));
        }
        positive("duration_seconds", self.duration_seconds)?;
        positive("nominal_sample_rate", self.nominal_sample_rate)?;
        positive("resolve_timeout_seconds", self.resolve_timeout_seconds)?;
        if self.chunk_size == 0 {
            return Err(invalid("chunk_size", "must be at least 1"));
        }
        if self.ring_capacity == 0 || self.ring_capacity > MAX_RING_CAPACITY {
            return Err(invalid(
                "ring_capacity",
                format!("must be between 1 and {}, got {}", MAX_RING_CAPACITY, self.ring_capacity),
            ));
        }
        if self.drain_batch == 0 {
            return Err(invalid("drain_batch", "must be at least 1"));
        }
        if self.pull_timeout_ms == 0 {
            return Err(invalid("pull_timeout_ms", "must be at least 1"));
        }
        if self.drain_interval_ms == 0 {
            return Err(invalid("drain_interval_ms", "must be at least 1"));
        }
        if self.sources.is_empty() {
            return Err(invalid("sources", "at least one stream source is required"));
        }
        Ok(())
    }

    pub fn selector(&self) -> Selector {
        Selector::new(self.stream_key.clone(), self.stream_value.clone())
    }

    pub fn duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.duration_seconds).unwrap_or(Duration::ZERO)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.resolve_timeout_seconds).unwrap_or(Duration::ZERO)
    }

    pub fn pull_timeout(&self) -> Duration {
        Duration::from_millis(self.pull_timeout_ms)
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }
}
