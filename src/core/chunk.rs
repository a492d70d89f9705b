use std::sync::Arc;

/// One pull's worth of samples: per-sample source timestamps plus the
/// single local time at which the whole chunk arrived.
///
/// Never empty and never mutated after construction; clones share the
/// timestamp storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Worker-assigned, strictly increasing per worker
    sequence: u64,

    /// Source-side timestamps in seconds, in sample order
    timestamps: Arc<[f64]>,

    /// Local receive time in seconds
    received_at: f64,
}

impl Chunk {
    /// Returns `None` for an empty timestamp list or any non-finite time.
    pub fn new(sequence: u64, timestamps: impl Into<Arc<[f64]>>, received_at: f64) -> Option<Self> {
        let timestamps = timestamps.into();
        if timestamps.is_empty() || !received_at.is_finite() || !timestamps.iter().all(|t| t.is_finite()) {
            return None;
        }
        Some(Self {
            sequence,
            timestamps,
            received_at,
        })
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn received_at(&self) -> f64 {
        self.received_at
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Always false for a constructed chunk.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn first_timestamp(&self) -> f64 {
        self.timestamps[0]
    }

    pub fn last_timestamp(&self) -> f64 {
        self.timestamps[self.timestamps.len() - 1]
    }
}
