//! Supervisor lifecycle status and state machine.
//!
//! ```text
//! start()           → Launching (pull, create, start)
//! launch succeeded  → Running   (state persisted, watcher spawned)
//! first exit cause  → ShuttingDown
//! cleanup done      → Stopped
//! ```
//!
//! `Running` is split into awaiting-ready and ready by a flag on
//! [`SupervisorState`], not by a separate status.

use serde::{Deserialize, Serialize};

use crate::driver::ContainerId;
use crate::errors::{NodekeeperError, NodekeeperResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStatus {
    /// Nothing launched by this process yet.
    Idle,

    /// Pulling the image and creating/starting the container.
    Launching,

    /// Container is running and recorded in the state file.
    Running,

    /// A shutdown cause was accepted; cleanup is in progress (transient).
    ShuttingDown,

    /// Terminal. The state file has been cleared.
    Stopped,
}

impl LifecycleStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, LifecycleStatus::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleStatus::Stopped)
    }

    /// Check if transition to target state is valid.
    pub fn can_transition_to(&self, target: LifecycleStatus) -> bool {
        use LifecycleStatus::*;
        matches!(
            (self, target),
            (Idle, Launching) |
            // Operator stop of a container launched by an earlier process
            (Idle, ShuttingDown) |
            (Launching, Running) |
            // Launch failed before anything was persisted
            (Launching, Stopped) |
            (Running, ShuttingDown) |
            (ShuttingDown, Stopped)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStatus::Idle => "idle",
            LifecycleStatus::Launching => "launching",
            LifecycleStatus::Running => "running",
            LifecycleStatus::ShuttingDown => "shutting_down",
            LifecycleStatus::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mutable supervisor state, guarded by the supervisor's mutex.
#[derive(Debug, Clone)]
pub struct SupervisorState {
    pub status: LifecycleStatus,
    /// Set once the readiness watcher fired.
    pub ready: bool,
    pub container_id: Option<ContainerId>,
    /// Whether the recorded container was running at reconciliation time.
    pub container_is_up: bool,
}

impl SupervisorState {
    pub fn new() -> Self {
        Self {
            status: LifecycleStatus::Idle,
            ready: false,
            container_id: None,
            container_is_up: false,
        }
    }

    /// Attempt state transition with validation.
    pub fn transition_to(&mut self, new_status: LifecycleStatus) -> NodekeeperResult<()> {
        if !self.status.can_transition_to(new_status) {
            return Err(NodekeeperError::InvalidState(format!(
                "Cannot transition from {} to {}",
                self.status, new_status
            )));
        }
        tracing::debug!(from = %self.status, to = %new_status, "Lifecycle transition");
        self.status = new_status;
        Ok(())
    }

    /// Mark the node as stopped and forget the container.
    pub fn mark_stopped(&mut self) {
        self.status = LifecycleStatus::Stopped;
        self.container_is_up = false;
        self.ready = false;
    }
}

impl Default for SupervisorState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        use LifecycleStatus::*;

        assert!(Idle.can_transition_to(Launching));
        assert!(Idle.can_transition_to(ShuttingDown));
        assert!(!Idle.can_transition_to(Running));

        assert!(Launching.can_transition_to(Running));
        assert!(Launching.can_transition_to(Stopped));
        assert!(!Launching.can_transition_to(Idle));

        assert!(Running.can_transition_to(ShuttingDown));
        assert!(!Running.can_transition_to(Stopped));
        assert!(!Running.can_transition_to(Launching));

        assert!(ShuttingDown.can_transition_to(Stopped));
        assert!(!ShuttingDown.can_transition_to(Running));
        assert!(!ShuttingDown.can_transition_to(ShuttingDown));

        // Stopped is terminal
        assert!(!Stopped.can_transition_to(Idle));
        assert!(!Stopped.can_transition_to(Launching));
        assert!(!Stopped.can_transition_to(Running));
    }

    #[test]
    fn test_state_transition() {
        let mut state = SupervisorState::new();
        assert_eq!(state.status, LifecycleStatus::Idle);

        state.transition_to(LifecycleStatus::Launching).unwrap();
        state.transition_to(LifecycleStatus::Running).unwrap();
        state.transition_to(LifecycleStatus::ShuttingDown).unwrap();
        state.transition_to(LifecycleStatus::Stopped).unwrap();
        assert!(state.status.is_terminal());
    }

    #[test]
    fn test_invalid_transition_leaves_state_unchanged() {
        let mut state = SupervisorState::new();

        let result = state.transition_to(LifecycleStatus::Running);
        assert!(matches!(result, Err(NodekeeperError::InvalidState(_))));
        assert_eq!(state.status, LifecycleStatus::Idle);
    }

    #[test]
    fn test_mark_stopped() {
        let mut state = SupervisorState {
            status: LifecycleStatus::ShuttingDown,
            ready: true,
            container_id: Some("abc123".into()),
            container_is_up: true,
        };
        state.mark_stopped();

        assert_eq!(state.status, LifecycleStatus::Stopped);
        assert!(!state.ready);
        assert!(!state.container_is_up);
        assert_eq!(state.container_id, Some("abc123".into()));
    }

    #[test]
    fn test_status_as_str() {
        assert_eq!(LifecycleStatus::Idle.as_str(), "idle");
        assert_eq!(LifecycleStatus::ShuttingDown.as_str(), "shutting_down");
        assert_eq!(LifecycleStatus::Stopped.to_string(), "stopped");
    }
}
