use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Lifecycle of an inlet worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum WorkerStatus {
    Idle = 0,
    Resolving = 1,
    Running = 2,
    Stopped = 3,
    Failed = 4,
}

impl WorkerStatus {
    /// Check if transition from current status to target status is valid
    pub fn can_transition_to(&self, target: WorkerStatus) -> bool {
        use WorkerStatus::*;

        matches!(
            (self, target),
            (Idle, Resolving) |
            (Resolving, Running) |
            (Resolving, Failed) |
            (Running, Stopped) |
            (Running, Failed)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Resolving => "Resolving",
            Self::Running => "Running",
            Self::Stopped => "Stopped",
            Self::Failed => "Failed",
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Resolving,
            2 => Self::Running,
            3 => Self::Stopped,
            _ => Self::Failed,
        }
    }
}

/// Move `cell` to `target` if the transition table allows it from the
/// status currently stored.
///
/// Returns the previous status, or the status that blocked the move.
pub(crate) fn transition(cell: &AtomicU8, target: WorkerStatus) -> Result<WorkerStatus, WorkerStatus> {
    cell.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
        WorkerStatus::from_u8(current)
            .can_transition_to(target)
            .then_some(target as u8)
    })
    .map(WorkerStatus::from_u8)
    .map_err(WorkerStatus::from_u8)
}

impl Default for WorkerStatus {
    fn default() -> Self {
        Self::Idle
    }
}
