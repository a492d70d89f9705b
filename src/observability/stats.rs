use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Live counters for one inlet worker, shared with its owner.
#[derive(Debug, Default)]
pub struct InletStats {
    pull_attempts: AtomicU64,
    empty_pulls: AtomicU64,
    chunks_pushed: AtomicU64,
    samples_pushed: AtomicU64,
    transient_errors: AtomicU64,
}

/// Point-in-time copy of [`InletStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InletStatsSnapshot {
    pub pull_attempts: u64,
    pub empty_pulls: u64,
    pub chunks_pushed: u64,
    pub samples_pushed: u64,
    pub transient_errors: u64,
}

impl InletStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pull(&self) {
        self.pull_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_empty(&self) {
        self.empty_pulls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_chunk(&self, samples: usize) {
        self.chunks_pushed.fetch_add(1, Ordering::Relaxed);
        self.samples_pushed.fetch_add(samples as u64, Ordering::Relaxed);
    }

    pub fn record_transient_error(&self) {
        self.transient_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn chunks_pushed(&self) -> u64 {
        self.chunks_pushed.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> InletStatsSnapshot {
        InletStatsSnapshot {
            pull_attempts: self.pull_attempts.load(Ordering::Relaxed),
            empty_pulls: self.empty_pulls.load(Ordering::Relaxed),
            chunks_pushed: self.chunks_pushed.load(Ordering::Relaxed),
            samples_pushed: self.samples_pushed.load(Ordering::Relaxed),
            transient_errors: self.transient_errors.load(Ordering::Relaxed),
        }
    }
}
