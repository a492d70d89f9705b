use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use super::types::{Pulled, StreamInfo};
use crate::error::PullError;

/// Discovers streams of one kind and opens inlets on them.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    /// Unique resolver identifier (e.g., "synthetic")
    fn resolver_id(&self) -> &str;

    /// Streams currently visible to this resolver
    async fn discover(&self) -> Result<Vec<StreamInfo>>;

    /// Open an inlet on a stream this resolver discovered
    fn open(&self, info: &StreamInfo) -> Result<Box<dyn StreamInlet>>;
}

/// Blocking pull side of an open stream. Lives on the inlet worker thread.
pub trait StreamInlet: Send {
    /// Pull up to `max_samples` samples, waiting at most about `timeout`.
    ///
    /// `Ok(None)` means nothing arrived in time, which is not an error.
    fn pull_chunk(&mut self, max_samples: usize, timeout: Duration) -> Result<Option<Pulled>, PullError>;

    /// Release the underlying stream.
    fn close(&mut self) {}
}
