use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Fatal conditions raised by the inlet worker.
#[derive(Debug, Error)]
pub enum InletError {
    #[error("no stream matching {key}={value} appeared within {timeout:?}")]
    StreamNotFound {
        key: String,
        value: String,
        timeout: Duration,
    },

    #[error("stream '{stream}' disconnected: {reason}")]
    StreamDisconnected { stream: String, reason: String },

    #[error("inlet worker already started")]
    AlreadyStarted,

    #[error("failed to open stream '{stream}': {reason}")]
    Open { stream: String, reason: String },

    #[error("inlet worker thread terminated without reporting")]
    WorkerLost,

    #[error("failed to spawn inlet worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Outcome of a single failed pull.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PullError {
    /// Recoverable; the worker logs it and pulls again.
    #[error("transient pull error: {0}")]
    Transient(String),

    /// The stream is gone for good.
    #[error("stream lost: {0}")]
    Disconnected(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum MetricsError {
    #[error("nominal sample rate must be positive and finite, got {0}")]
    InvalidNominalRate(f64),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("settings file not found: {0}")]
    MissingFile(PathBuf),

    #[error("unsupported settings file extension for {0} (expected .toml or .json)")]
    UnsupportedFormat(PathBuf),

    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML settings {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to parse JSON settings {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid setting '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}
