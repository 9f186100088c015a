//! Events multiplexed by the wait loop and the outcomes they lead to.

use std::fmt;

use crate::driver::ContainerId;
use crate::errors::NodekeeperError;
use crate::signals::SignalKind;

/// Process exit codes produced by `nodekeeper start`.
pub mod exit_codes {
    /// Shut down on an interrupt/terminate signal or operator stop.
    pub const GRACEFUL: i32 = 1;

    /// The container stopped on its own.
    pub const UNEXPECTED_STOP: i32 = 2;

    /// Driver, notification or readiness failure.
    pub const FAULT: i32 = 3;
}

/// Everything the wait loop reacts to, from every asynchronous source.
#[derive(Debug)]
pub enum LifecycleEvent {
    /// Container is no longer running; carries its exit code.
    ContainerExited(i64),
    SignalReceived(SignalKind),
    /// The readiness marker appeared in the node log.
    WatcherReady,
    /// Container engine failure while waiting or watching logs, or an
    /// expired readiness budget.
    DriverError(NodekeeperError),
    /// Readiness or heartbeat notification failed.
    NotifyError(NodekeeperError),
    /// A background task ended abnormally, for example by panicking.
    TaskFailed { task: &'static str, error: String },
}

/// Why the supervisor shut down.
#[derive(Debug)]
pub enum ShutdownCause {
    ContainerExited { code: i64 },
    Signal(SignalKind),
    OperatorStop,
    Fault(NodekeeperError),
}

impl ShutdownCause {
    /// Whether the supervisor should stop the container itself.
    pub fn requires_stop(&self) -> bool {
        !matches!(self, ShutdownCause::ContainerExited { .. })
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownCause::Signal(_) | ShutdownCause::OperatorStop => exit_codes::GRACEFUL,
            ShutdownCause::ContainerExited { .. } => exit_codes::UNEXPECTED_STOP,
            ShutdownCause::Fault(_) => exit_codes::FAULT,
        }
    }
}

impl fmt::Display for ShutdownCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownCause::ContainerExited { code } => {
                write!(f, "container stopped with status {}", code)
            }
            ShutdownCause::Signal(kind) => write!(f, "received signal: {}", kind),
            ShutdownCause::OperatorStop => write!(f, "operator stop"),
            ShutdownCause::Fault(e) => write!(f, "fault: {}", e),
        }
    }
}

/// Summary of the single shutdown sequence.
#[derive(Debug)]
pub struct ShutdownReport {
    pub cause: ShutdownCause,
    pub container_id: Option<ContainerId>,
    /// Whether a stop command was sent to the engine.
    pub stop_issued: bool,
    /// Set when the stop command failed or did not return in time.
    pub stop_error: Option<String>,
}

impl ShutdownReport {
    pub fn exit_code(&self) -> i32 {
        self.cause.exit_code()
    }
}
