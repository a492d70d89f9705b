use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::core::Chunk;

/// Largest capacity accepted from configuration.
pub const MAX_RING_CAPACITY: usize = 1 << 20;

/// Slots reserved up front; the queue grows on demand up to `capacity`.
const INITIAL_RESERVE: usize = 64;

struct RingState {
    queue: VecDeque<Chunk>,
    drops: u64,
}

/// Bounded FIFO of received chunks with a drop-oldest overflow policy.
///
/// Clones share the same storage, so the inlet worker and the drain loop
/// each hold a handle. A single mutex guards both the queue and the drop
/// counter; neither `push` nor `drain_upto` ever waits on anything else.
pub struct ChunkRing {
    state: Arc<Mutex<RingState>>,
    capacity: usize,
}

impl ChunkRing {
    /// A capacity of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Arc::new(Mutex::new(RingState {
                queue: VecDeque::with_capacity(capacity.min(INITIAL_RESERVE)),
                drops: 0,
            })),
            capacity,
        }
    }

    /// Appends at the tail, evicting the head first when full.
    ///
    /// Returns `true` if a chunk was evicted.
    pub fn push(&self, chunk: Chunk) -> bool {
        let mut state = self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let evicted = if state.queue.len() >= self.capacity {
            state.queue.pop_front();
            state.drops += 1;
            true
        } else {
            false
        };

        state.queue.push_back(chunk);
        evicted
    }

    /// Removes and returns up to `max_count` chunks in push order.
    pub fn drain_upto(&self, max_count: usize) -> Vec<Chunk> {
        let mut state = self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let take = max_count.min(state.queue.len());
        let mut out = Vec::with_capacity(take);
        out.extend(state.queue.drain(..take));
        out
    }

    /// Cumulative number of evicted chunks.
    pub fn drops(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .drops
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .queue
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Clone for ChunkRing {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            capacity: self.capacity,
        }
    }
}

impl std::fmt::Debug for ChunkRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkRing")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("drops", &self.drops())
            .finish()
    }
}
