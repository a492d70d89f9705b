use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;

use crate::clock::local_clock;
use crate::error::PullError;
use crate::source::traits::{StreamInlet, StreamResolver};
use crate::source::types::{Pulled, StreamInfo};

/// One planned pull outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    /// Return these source timestamps, received now
    Chunk(Vec<f64>),
    /// Return these timestamps after blocking for `delay`
    Slow { delay: Duration, timestamps: Vec<f64> },
    /// Nothing arrived within the timeout
    Empty,
    Transient(String),
    Disconnect(String),
}

/// Deterministic resolver whose inlets replay a fixed script.
///
/// Once the script is exhausted, pulls behave like an idle stream: they
/// wait out the timeout and return nothing.
pub struct ScriptedResolver {
    id: String,
    info: StreamInfo,
    script: Vec<ScriptStep>,
    visible_after: Duration,
    created: Instant,
    open_error: Option<String>,
    closed: Arc<AtomicBool>,
}

impl ScriptedResolver {
    pub fn new(info: StreamInfo, script: Vec<ScriptStep>) -> Self {
        Self {
            id: info.resolver_id.clone(),
            info,
            script,
            visible_after: Duration::ZERO,
            created: Instant::now(),
            open_error: None,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stream info with the given type, owned by a resolver named `resolver_id`.
    pub fn stream(resolver_id: &str, name: &str, stream_type: &str, nominal_srate: f64) -> StreamInfo {
        StreamInfo {
            name: name.to_string(),
            stream_type: stream_type.to_string(),
            source_id: format!("{}-{}", resolver_id, name),
            nominal_srate,
            channel_count: 1,
            resolver_id: resolver_id.to_string(),
        }
    }

    /// Hide the stream from discovery until `delay` after construction.
    pub fn visible_after(mut self, delay: Duration) -> Self {
        self.visible_after = delay;
        self
    }

    pub fn failing_open(mut self, message: impl Into<String>) -> Self {
        self.open_error = Some(message.into());
        self
    }

    /// Set once any inlet from this resolver is closed.
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }
}

#[async_trait]
impl StreamResolver for ScriptedResolver {
    fn resolver_id(&self) -> &str {
        &self.id
    }

    async fn discover(&self) -> Result<Vec<StreamInfo>> {
        if self.created.elapsed() < self.visible_after {
            return Ok(Vec::new());
        }
        Ok(vec![self.info.clone()])
    }

    fn open(&self, _info: &StreamInfo) -> Result<Box<dyn StreamInlet>> {
        if let Some(message) = &self.open_error {
            anyhow::bail!("{}", message);
        }
        Ok(Box::new(ScriptedInlet {
            steps: self.script.iter().cloned().collect(),
            closed: self.closed.clone(),
        }))
    }
}

pub struct ScriptedInlet {
    steps: VecDeque<ScriptStep>,
    closed: Arc<AtomicBool>,
}

impl StreamInlet for ScriptedInlet {
    fn pull_chunk(&mut self, max_samples: usize, timeout: Duration) -> Result<Option<Pulled>, PullError> {
        let step = match self.steps.pop_front() {
            Some(step) => step,
            None => {
                std::thread::sleep(timeout);
                return Ok(None);
            }
        };

        let timestamps = match step {
            ScriptStep::Chunk(timestamps) => timestamps,
            ScriptStep::Slow { delay, timestamps } => {
                std::thread::sleep(delay);
                timestamps
            }
            ScriptStep::Empty => return Ok(None),
            ScriptStep::Transient(reason) => return Err(PullError::Transient(reason)),
            ScriptStep::Disconnect(reason) => return Err(PullError::Disconnected(reason)),
        };

        let mut timestamps = timestamps;
        timestamps.truncate(max_samples.max(1));
        if timestamps.is_empty() {
            return Ok(None);
        }
        Ok(Some(Pulled {
            timestamps,
            received_at: local_clock(),
        }))
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
