//! Error types shared by every nodekeeper component.

use std::time::Duration;

use thiserror::Error;

/// Result alias used across the crate.
pub type NodekeeperResult<T> = Result<T, NodekeeperError>;

/// All failures surfaced by the supervisor and its collaborators.
#[derive(Debug, Error)]
pub enum NodekeeperError {
    /// State file could not be read or written.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Container engine could not be reached or answered with a server fault.
    ///
    /// Retryable.
    #[error("container engine transport error: {0}")]
    Transport(String),

    /// Container engine rejected the request.
    #[error("container engine error: {0}")]
    Driver(String),

    /// Container engine does not know the requested container or image.
    #[error("not found: {0}")]
    NotFound(String),

    /// The node never logged its readiness marker within the configured budget.
    #[error("node did not become ready within {0:?}")]
    ReadinessTimeout(Duration),

    /// Signalling the service manager failed.
    #[error("service manager notification failed: {0}")]
    Notify(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// Downloading node configuration failed.
    #[error("network error: {0}")]
    Network(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl NodekeeperError {
    /// Whether the operation that produced this error may succeed if repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(self, NodekeeperError::Transport(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, NodekeeperError::NotFound(_))
    }
}

impl From<bollard::errors::Error> for NodekeeperError {
    fn from(err: bollard::errors::Error) -> Self {
        use bollard::errors::Error as DockerError;

        match err {
            DockerError::DockerResponseServerError {
                status_code,
                message,
            } => match status_code {
                404 => NodekeeperError::NotFound(message),
                500..=599 => NodekeeperError::Transport(format!("{status_code}: {message}")),
                _ => NodekeeperError::Driver(format!("{status_code}: {message}")),
            },
            e @ (DockerError::IOError { .. }
            | DockerError::HyperResponseError { .. }
            | DockerError::RequestTimeoutError) => NodekeeperError::Transport(e.to_string()),
            other => NodekeeperError::Driver(other.to_string()),
        }
    }
}

impl From<serde_yaml::Error> for NodekeeperError {
    fn from(err: serde_yaml::Error) -> Self {
        NodekeeperError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for NodekeeperError {
    fn from(err: reqwest::Error) -> Self {
        NodekeeperError::Network(err.to_string())
    }
}
