//! Process and system resource sampling during a run.

use std::time::Duration;

use anyhow::{bail, Result};
use serde::Serialize;
use sysinfo::{CpuRefreshKind, Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};

use crate::record::FlatRecord;

/// One reading from a [`ResourceProbe`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceSample {
    pub process_cpu_percent: f64,
    pub process_rss_bytes: u64,
    pub per_core_cpu_percent: Vec<f64>,
}

pub trait ResourceProbe: Send {
    fn sample(&mut self) -> ResourceSample;
}

/// Reads the current process and all cores through `sysinfo`.
///
/// CPU figures are deltas since the previous refresh, so the very first
/// sample may read zero.
pub struct SysinfoProbe {
    system: System,
    pid: Option<Pid>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let mut system = System::new_with_specifics(
            RefreshKind::nothing()
                .with_processes(ProcessRefreshKind::everything())
                .with_cpu(CpuRefreshKind::everything()),
        );

        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!(error = %e, "cannot determine current pid; process usage disabled");
                None
            }
        };

        system.refresh_cpu_usage();
        if let Some(pid) = pid {
            system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        }

        Self { system, pid }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProbe for SysinfoProbe {
    fn sample(&mut self) -> ResourceSample {
        self.system.refresh_cpu_usage();

        let mut sample = ResourceSample {
            per_core_cpu_percent: self
                .system
                .cpus()
                .iter()
                .map(|cpu| cpu.cpu_usage() as f64)
                .collect(),
            ..Default::default()
        };

        if let Some(pid) = self.pid {
            self.system
                .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
            if let Some(process) = self.system.process(pid) {
                sample.process_cpu_percent = process.cpu_usage() as f64;
                sample.process_rss_bytes = process.memory();
            }
        }

        sample
    }
}

/// Averages over every sample taken during a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, FlatRecord)]
pub struct ResourceUsage {
    pub process_cpu_percent_avg: f64,
    pub process_cpu_percent_max: f64,
    pub process_rss_avg_bytes: f64,
    pub process_rss_max_bytes: u64,
    /// Mean of the per-core averages
    pub system_cpu_percent_avg: f64,
    #[record(skip)]
    pub system_per_core_percent_avg: Vec<f64>,
    #[record(rename = "resource_samples")]
    pub sample_count: u64,
}

/// Running totals over every sample taken so far.
#[derive(Debug, Default)]
struct Totals {
    count: u64,
    process_cpu_sum: f64,
    process_cpu_max: f64,
    rss_sum: f64,
    rss_max: u64,
    /// Core count can change between samples; each index keeps its own count
    core_sums: Vec<f64>,
    core_counts: Vec<u64>,
}

impl Totals {
    fn add(&mut self, sample: &ResourceSample) {
        self.count += 1;
        self.process_cpu_sum += sample.process_cpu_percent;
        self.process_cpu_max = self.process_cpu_max.max(sample.process_cpu_percent);
        self.rss_sum += sample.process_rss_bytes as f64;
        self.rss_max = self.rss_max.max(sample.process_rss_bytes);

        let cores = sample.per_core_cpu_percent.len();
        if cores > self.core_sums.len() {
            self.core_sums.resize(cores, 0.0);
            self.core_counts.resize(cores, 0);
        }
        for (i, value) in sample.per_core_cpu_percent.iter().enumerate() {
            self.core_sums[i] += value;
            self.core_counts[i] += 1;
        }
    }
}

/// Samples a [`ResourceProbe`] no more often than a fixed interval.
///
/// Only running sums and maxima are kept, so memory does not grow with the
/// length of the run.
pub struct ResourceMonitor {
    probe: Box<dyn ResourceProbe>,
    interval: f64,
    last_sample_at: Option<f64>,
    totals: Totals,
}

impl ResourceMonitor {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

    pub fn new(probe: Box<dyn ResourceProbe>, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            bail!("resource sampling interval must be positive");
        }
        Ok(Self {
            probe,
            interval: interval.as_secs_f64(),
            last_sample_at: None,
            totals: Totals::default(),
        })
    }

    pub fn with_sysinfo(interval: Duration) -> Result<Self> {
        Self::new(Box::new(SysinfoProbe::new()), interval)
    }

    /// Take a sample if at least one interval has passed since the last.
    ///
    /// `now` is in seconds on any monotonic clock.
    pub fn maybe_sample(&mut self, now: f64) -> bool {
        let due = match self.last_sample_at {
            None => true,
            Some(last) => now - last >= self.interval,
        };
        if due {
            self.take(now);
        }
        due
    }

    /// Always take one last sample.
    pub fn finalize(&mut self, now: f64) {
        self.take(now);
    }

    fn take(&mut self, now: f64) {
        let sample = self.probe.sample();
        self.totals.add(&sample);
        self.last_sample_at = Some(now);
    }

    /// `None` until at least one sample exists.
    pub fn snapshot(&self) -> Option<ResourceUsage> {
        let totals = &self.totals;
        if totals.count == 0 {
            return None;
        }
        let n = totals.count as f64;

        let per_core: Vec<f64> = totals
            .core_sums
            .iter()
            .zip(&totals.core_counts)
            .map(|(sum, &count)| if count == 0 { 0.0 } else { sum / count as f64 })
            .collect();
        let system_cpu_percent_avg = if per_core.is_empty() {
            0.0
        } else {
            per_core.iter().sum::<f64>() / per_core.len() as f64
        };

        Some(ResourceUsage {
            process_cpu_percent_avg: totals.process_cpu_sum / n,
            process_cpu_percent_max: totals.process_cpu_max,
            process_rss_avg_bytes: totals.rss_sum / n,
            process_rss_max_bytes: totals.rss_max,
            system_cpu_percent_avg,
            system_per_core_percent_avg: per_core,
            sample_count: totals.count,
        })
    }
}
