use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Longest pause the worker takes between transient failures, so a stop
/// request is never left waiting behind a backoff.
pub const MAX_RETRY_DELAY: Duration = Duration::from_millis(100);

/// How the inlet worker paces itself after transient pull errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum RetryStrategy {
    /// Pull again right away
    Immediate,

    /// Exponential backoff, reset on the next successful pull
    Backoff { base_ms: u64, max_ms: u64 },
}

impl RetryStrategy {
    /// Delay before retrying after `attempt` consecutive failures (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            Self::Immediate => Duration::ZERO,
            Self::Backoff { base_ms, max_ms } => {
                let exp = attempt.saturating_sub(1).min(16);
                let ms = base_ms.saturating_mul(1u64 << exp).min(*max_ms);
                Duration::from_millis(ms).min(MAX_RETRY_DELAY)
            }
        }
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::Backoff {
            base_ms: 5,
            max_ms: 100,
        }
    }
}
