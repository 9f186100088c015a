//! Container driver: the only component that talks to the container engine.

mod docker;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::NodekeeperResult;
use crate::spec::ContainerSpec;

pub use docker::DockerDriver;

/// Opaque container handle assigned by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, as printed by `docker ps`.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(12)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContainerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One entry of the engine's container list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: ContainerId,
    /// Engine state string (`running`, `exited`, `created`, ...).
    pub state: String,
}

impl ContainerSummary {
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

/// Read position in a container's log stream.
///
/// `since` is a Unix timestamp in seconds. Engines only resolve to whole
/// seconds, so a cursor read may return lines already seen; callers dedup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogCursor {
    pub since: Option<i64>,
}

impl LogCursor {
    /// Cursor reading the whole stream from the start.
    pub fn start() -> Self {
        Self::default()
    }

    /// Advance to `timestamp` if it is later than the current position.
    pub fn advance(&mut self, timestamp: Option<i64>) {
        if let Some(ts) = timestamp
            && self.since.is_none_or(|current| ts > current)
        {
            self.since = Some(ts);
        }
    }
}

/// One line of container output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Unix timestamp in seconds, when the engine reports one.
    pub timestamp: Option<i64>,
    pub text: String,
}

impl LogLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            timestamp: None,
            text: text.into(),
        }
    }
}

/// Operations the supervisor needs from a container engine.
///
/// Implementations must be safe for concurrent use: the supervisor keeps
/// stop, wait and log requests in flight at the same time.
#[async_trait]
pub trait ContainerDriver: Send + Sync {
    /// Pull `image`, returning after the pull completes.
    async fn pull_image(&self, image: &str) -> NodekeeperResult<()>;

    async fn create_container(&self, spec: &ContainerSpec) -> NodekeeperResult<ContainerId>;

    async fn start_container(&self, id: &ContainerId) -> NodekeeperResult<()>;

    /// Stop the container, letting the engine kill it after `timeout`.
    async fn stop_container(&self, id: &ContainerId, timeout: Duration) -> NodekeeperResult<()>;

    /// Block until the container is no longer running and return its exit code.
    async fn wait_exit(&self, id: &ContainerId) -> NodekeeperResult<i64>;

    /// Fetch stdout lines from `cursor` onwards.
    async fn fetch_logs(&self, id: &ContainerId, cursor: LogCursor)
    -> NodekeeperResult<Vec<LogLine>>;

    /// List all containers known to the engine, running or not.
    async fn list_containers(&self) -> NodekeeperResult<Vec<ContainerSummary>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_id_short() {
        let id = ContainerId::new("0123456789abcdef0123");
        assert_eq!(id.short(), "0123456789ab");
        assert_eq!(ContainerId::new("abc").short(), "abc");
    }

    #[test]
    fn test_cursor_only_moves_forward() {
        let mut cursor = LogCursor::start();
        cursor.advance(None);
        assert_eq!(cursor.since, None);

        cursor.advance(Some(100));
        cursor.advance(Some(90));
        assert_eq!(cursor.since, Some(100));

        cursor.advance(Some(101));
        assert_eq!(cursor.since, Some(101));
    }

    #[test]
    fn test_summary_running() {
        let summary = ContainerSummary {
            id: "abc".into(),
            state: "running".into(),
        };
        assert!(summary.is_running());
        let exited = ContainerSummary {
            state: "exited".into(),
            ..summary
        };
        assert!(!exited.is_running());
    }
}
