use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use serde_json::Value;

use crate::clock::local_clock;
use crate::error::PullError;
use crate::source::registry::ResolverFactory;
use crate::source::traits::{StreamInlet, StreamResolver};
use crate::source::types::{Pulled, StreamInfo};

pub const SYNTHETIC_KIND: &str = "synthetic";

/// Options for the simulated real-time stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyntheticConfig {
    pub name: String,
    pub stream_type: String,
    pub source_id: String,
    pub channel_count: u32,
    pub nominal_srate: f64,
    /// Samples the simulated outlet emits at once
    pub chunk_size: usize,
    /// Upper bound of the uniform extra delivery delay per chunk
    pub jitter_ms: f64,
    /// Probability (percent) that a whole chunk is never delivered
    pub burst_loss_percent: f64,
    /// Source clock runs slow by this much, so latency grows at this rate
    pub drift_ms_per_minute: f64,
    pub seed: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "EEG_Sim".to_string(),
            stream_type: "EEG".to_string(),
            source_id: "streamprobe-synthetic".to_string(),
            channel_count: 8,
            nominal_srate: 1000.0,
            chunk_size: 32,
            jitter_ms: 0.0,
            burst_loss_percent: 0.0,
            drift_ms_per_minute: 0.0,
            seed: None,
        }
    }
}

impl SyntheticConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.nominal_srate.is_finite() && self.nominal_srate > 0.0) {
            anyhow::bail!("nominal_srate must be positive, got {}", self.nominal_srate);
        }
        if self.chunk_size == 0 {
            anyhow::bail!("chunk_size must be at least 1");
        }
        if !(self.jitter_ms.is_finite() && self.jitter_ms >= 0.0) {
            anyhow::bail!("jitter_ms must be non-negative, got {}", self.jitter_ms);
        }
        if !(0.0..=100.0).contains(&self.burst_loss_percent) {
            anyhow::bail!(
                "burst_loss_percent must be within 0..=100, got {}",
                self.burst_loss_percent
            );
        }
        if !self.drift_ms_per_minute.is_finite() {
            anyhow::bail!("drift_ms_per_minute must be finite");
        }
        Ok(())
    }
}

/// Resolver exposing one in-process simulated stream.
pub struct SyntheticResolver {
    config: SyntheticConfig,
}

impl SyntheticResolver {
    pub fn new(config: SyntheticConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn stream_info(&self) -> StreamInfo {
        StreamInfo {
            name: self.config.name.clone(),
            stream_type: self.config.stream_type.clone(),
            source_id: self.config.source_id.clone(),
            nominal_srate: self.config.nominal_srate,
            channel_count: self.config.channel_count,
            resolver_id: SYNTHETIC_KIND.to_string(),
        }
    }
}

#[async_trait]
impl StreamResolver for SyntheticResolver {
    fn resolver_id(&self) -> &str {
        SYNTHETIC_KIND
    }

    async fn discover(&self) -> Result<Vec<StreamInfo>> {
        Ok(vec![self.stream_info()])
    }

    fn open(&self, info: &StreamInfo) -> Result<Box<dyn StreamInlet>> {
        if info.source_id != self.config.source_id {
            anyhow::bail!("Unknown synthetic stream: {}", info.source_id);
        }
        Ok(Box::new(SyntheticInlet::new(self.config.clone())))
    }
}

fn build_synthetic(options: &Value) -> Result<Box<dyn StreamResolver>> {
    let config: SyntheticConfig = if options.is_null() {
        SyntheticConfig::default()
    } else {
        serde_json::from_value(options.clone()).context("Failed to parse synthetic source options")?
    };
    Ok(Box::new(SyntheticResolver::new(config)?))
}

inventory::submit! {
    ResolverFactory { kind: SYNTHETIC_KIND, build: build_synthetic }
}

/// Next chunk the simulated outlet will emit.
#[derive(Debug, Clone, Copy)]
struct Scheduled {
    first_index: u64,
    deliver_at: f64,
    lost: bool,
}

/// Pull side of the simulated stream.
///
/// Chunk `k` becomes available once its last sample has been produced in
/// real time, plus a random delivery delay. Deliveries stay in order. Lost
/// chunks still consume their sample indices, so they show up as gaps.
pub struct SyntheticInlet {
    config: SyntheticConfig,
    rng: StdRng,
    start: f64,
    sample_period: f64,
    source_period: f64,
    next: Scheduled,
    last_delivery: f64,
    pending: VecDeque<f64>,
    closed: bool,
}

impl SyntheticInlet {
    pub fn new(config: SyntheticConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let sample_period = 1.0 / config.nominal_srate;
        let source_period = sample_period * (1.0 - config.drift_ms_per_minute / 1000.0 / 60.0);
        let start = local_clock();

        let mut inlet = Self {
            config,
            rng,
            start,
            sample_period,
            source_period,
            next: Scheduled {
                first_index: 0,
                deliver_at: start,
                lost: false,
            },
            last_delivery: start,
            pending: VecDeque::new(),
            closed: false,
        };
        inlet.next = inlet.schedule(0);
        inlet
    }

    fn schedule(&mut self, first_index: u64) -> Scheduled {
        let size = self.config.chunk_size.max(1) as u64;
        let last_index = first_index + size - 1;
        let produced_at = self.start + last_index as f64 * self.sample_period;
        let jitter = if self.config.jitter_ms > 0.0 {
            self.rng.random::<f64>() * self.config.jitter_ms / 1000.0
        } else {
            0.0
        };
        let lost = self.config.burst_loss_percent > 0.0
            && self.rng.random::<f64>() * 100.0 < self.config.burst_loss_percent;

        let deliver_at = (produced_at + jitter).max(self.last_delivery);
        Scheduled {
            first_index,
            deliver_at,
            lost,
        }
    }

    /// Move every chunk due by `now` into the pending queue.
    fn release(&mut self, now: f64) {
        while self.next.deliver_at <= now {
            let chunk = self.next;
            if !chunk.lost {
                for i in 0..self.config.chunk_size.max(1) as u64 {
                    let index = chunk.first_index + i;
                    self.pending.push_back(self.start + index as f64 * self.source_period);
                }
            }
            self.last_delivery = chunk.deliver_at;
            self.next = self.schedule(chunk.first_index + self.config.chunk_size.max(1) as u64);
        }
    }
}

impl StreamInlet for SyntheticInlet {
    fn pull_chunk(&mut self, max_samples: usize, timeout: Duration) -> Result<Option<Pulled>, PullError> {
        if self.closed {
            return Err(PullError::Disconnected("synthetic inlet closed".to_string()));
        }

        let deadline = local_clock() + timeout.as_secs_f64();
        loop {
            let now = local_clock();
            self.release(now);
            if !self.pending.is_empty() {
                break;
            }
            if now >= deadline {
                return Ok(None);
            }
            let wait = self.next.deliver_at.min(deadline) - now;
            std::thread::sleep(Duration::from_secs_f64(wait.max(0.0)));
        }

        let take = max_samples.max(1).min(self.pending.len());
        let timestamps: Vec<f64> = self.pending.drain(..take).collect();
        Ok(Some(Pulled {
            timestamps,
            received_at: local_clock(),
        }))
    }

    fn close(&mut self) {
        self.closed = true;
        self.pending.clear();
    }
}
