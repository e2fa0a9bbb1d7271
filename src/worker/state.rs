//! Worker lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::worker::WorkerId;

/// Lifecycle state of a worker task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Registered, not yet looping.
    Starting,
    /// Ticking.
    Running,
    /// Kill, shutdown, or missing record observed; about to exit.
    Stopping,
    /// Task has returned.
    Terminated,
}

impl WorkerState {
    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: WorkerState) -> bool {
        use WorkerState::*;

        matches!(
            (self, target),
            (Starting, Running) | (Starting, Stopping) |
            (Running, Stopping) |
            (Stopping, Terminated)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Terminated => "terminated",
        };
        write!(f, "{s}")
    }
}

/// Why a worker left the `Running` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Killed,
    Shutdown,
    RecordMissing,
}

/// A state transition event.
#[derive(Debug, Clone, Serialize)]
pub struct StateTransition {
    pub from: WorkerState,
    pub to: WorkerState,
    pub timestamp: DateTime<Utc>,
}

/// Task-local lifecycle tracker for one worker.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerLifecycle {
    pub id: WorkerId,
    pub state: WorkerState,
    pub stop_reason: Option<StopReason>,
    pub transitions: Vec<StateTransition>,
}

impl WorkerLifecycle {
    pub fn new(id: WorkerId) -> Self {
        Self {
            id,
            state: WorkerState::Starting,
            stop_reason: None,
            transitions: Vec::new(),
        }
    }

    /// Transition to a new state.
    pub fn transition_to(&mut self, new_state: WorkerState) -> Result<(), String> {
        if !self.state.can_transition_to(new_state) {
            return Err(format!(
                "Cannot transition from {} to {}",
                self.state, new_state
            ));
        }

        self.transitions.push(StateTransition {
            from: self.state,
            to: new_state,
            timestamp: Utc::now(),
        });
        self.state = new_state;
        Ok(())
    }

    /// Enter `Stopping`, recording why.
    pub fn stop(&mut self, reason: StopReason) -> Result<(), String> {
        self.transition_to(WorkerState::Stopping)?;
        self.stop_reason = Some(reason);
        Ok(())
    }
}
