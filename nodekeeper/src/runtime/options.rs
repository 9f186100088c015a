//! Configuration for nodekeeper.
//!
//! A single [`NodekeeperOptions`] value is loaded once at startup and passed
//! by reference into the spec provider, the driver and the supervisor.

use std::path::{Path, PathBuf};
use std::time::Duration;

use dirs::home_dir;
use serde::{Deserialize, Serialize};

use crate::errors::{NodekeeperError, NodekeeperResult};
use crate::retry::BackoffPolicy;
use crate::runtime::constants::{cardano, envs, filenames, timing};

// ============================================================================
// Root Options
// ============================================================================

/// Complete supervisor configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodekeeperOptions {
    #[serde(default)]
    pub node: NodeOptions,

    #[serde(default)]
    pub docker: DockerOptions,

    #[serde(default)]
    pub cardano: CardanoOptions,

    #[serde(default)]
    pub supervisor: SupervisorOptions,
}

impl NodekeeperOptions {
    /// Load options from a YAML file.
    ///
    /// When `path` is `None` the location comes from `NODEKEEPER_CONFIG` or
    /// `$HOME/.nodekeeper.yaml`, and a missing file yields defaults. An
    /// explicitly given path must exist.
    pub fn load(path: Option<&Path>) -> NodekeeperResult<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match std::env::var_os(envs::NODEKEEPER_CONFIG) {
                Some(p) => (PathBuf::from(p), true),
                None => (default_config_path(), false),
            },
        };

        if !path.exists() {
            if explicit {
                return Err(NodekeeperError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| {
            NodekeeperError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content).map_err(|e| {
            NodekeeperError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    pub fn from_yaml(content: &str) -> NodekeeperResult<Self> {
        // An empty document deserializes to unit, not to a map.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let options: Self = serde_yaml::from_str(content)?;
        options.validate()?;
        Ok(options)
    }

    /// Reject values the supervisor cannot run with.
    pub fn validate(&self) -> NodekeeperResult<()> {
        if self.supervisor.log_poll_interval_ms == 0 {
            return Err(NodekeeperError::Config(
                "supervisor.log_poll_interval_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Log the effective configuration, one field per line.
    pub fn log_summary(&self) {
        tracing::info!(node_type = self.node.node_type(), "container type");
        tracing::info!(image = %self.docker.image, "docker image");
        tracing::info!(path = %self.cardano.base_container, "cardano base container");
        tracing::info!(path = %self.cardano.base_local.display(), "cardano base local");
        tracing::info!(db = %self.cardano.db, "cardano db");
        tracing::info!(socket = %self.cardano.socket, "cardano socket");
        tracing::info!(host = %self.cardano.host_address, "cardano host");
        tracing::info!(port = %self.cardano.port, "cardano port");
        tracing::info!(path = %self.supervisor.state_file.display(), "state file");
    }
}

fn default_config_path() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(filenames::CONFIG_FILE)
}

// ============================================================================
// Node Options
// ============================================================================

/// Identity of the node being run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeOptions {
    #[serde(default)]
    pub name: String,

    /// Pool ticker, informational only.
    #[serde(default)]
    pub ticker: String,

    /// Container hostname prefix. `Relay` or `Producer` is appended.
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Block producer when true, relay otherwise.
    #[serde(default)]
    pub producer: bool,
}

impl NodeOptions {
    pub fn node_type(&self) -> &'static str {
        if self.producer { "producer" } else { "relay" }
    }
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            name: String::new(),
            ticker: String::new(),
            server_name: default_server_name(),
            producer: false,
        }
    }
}

fn default_server_name() -> String {
    "cardano".to_string()
}

// ============================================================================
// Docker Options
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DockerOptions {
    #[serde(default = "default_image")]
    pub image: String,

    /// Extra ports to expose, in `port/proto` form.
    #[serde(default)]
    pub expose_ports: Vec<String>,
}

impl Default for DockerOptions {
    fn default() -> Self {
        Self {
            image: default_image(),
            expose_ports: Vec::new(),
        }
    }
}

fn default_image() -> String {
    cardano::DEFAULT_IMAGE.to_string()
}

// ============================================================================
// Cardano Options
// ============================================================================

/// Paths and network settings passed to `cardano-node run`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CardanoOptions {
    /// Mount point of the node directory inside the container.
    #[serde(default = "default_base_container")]
    pub base_container: String,

    /// Host directory bind-mounted at `base_container`.
    #[serde(default = "default_base_local")]
    pub base_local: PathBuf,

    #[serde(default = "default_db")]
    pub db: String,

    #[serde(default = "default_socket")]
    pub socket: String,

    #[serde(default = "default_host_address")]
    pub host_address: String,

    #[serde(default = "default_port")]
    pub port: String,

    /// Base URL the node configuration files are downloaded from.
    #[serde(default)]
    pub latest_config: Option<String>,

    #[serde(default)]
    pub prometheus: PrometheusOptions,
}

impl CardanoOptions {
    pub fn config_dir(&self) -> PathBuf {
        self.base_local.join(cardano::CONFIG_DIR)
    }

    pub fn rt_view_dir(&self) -> PathBuf {
        self.base_local.join(cardano::RT_VIEW_DIR)
    }
}

impl Default for CardanoOptions {
    fn default() -> Self {
        Self {
            base_container: default_base_container(),
            base_local: default_base_local(),
            db: default_db(),
            socket: default_socket(),
            host_address: default_host_address(),
            port: default_port(),
            latest_config: None,
            prometheus: PrometheusOptions::default(),
        }
    }
}

fn default_base_container() -> String {
    cardano::BASE_CONTAINER.to_string()
}

fn default_base_local() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(cardano::BASE_LOCAL_DIR)
}

fn default_db() -> String {
    cardano::DB.to_string()
}

fn default_socket() -> String {
    cardano::SOCKET.to_string()
}

fn default_host_address() -> String {
    cardano::HOST_ADDRESS.to_string()
}

fn default_port() -> String {
    cardano::PORT.to_string()
}

/// Prometheus endpoint written into the node config `hasPrometheus` field.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrometheusOptions {
    #[serde(default = "default_prometheus_address")]
    pub address: String,

    #[serde(default = "default_prometheus_port")]
    pub port: u16,
}

impl Default for PrometheusOptions {
    fn default() -> Self {
        Self {
            address: default_prometheus_address(),
            port: default_prometheus_port(),
        }
    }
}

fn default_prometheus_address() -> String {
    cardano::PROMETHEUS_ADDRESS.to_string()
}

fn default_prometheus_port() -> u16 {
    cardano::PROMETHEUS_PORT
}

// ============================================================================
// Supervisor Options
// ============================================================================

/// Timing and persistence settings for the lifecycle supervisor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SupervisorOptions {
    /// Where the managed container ID is recorded.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    #[serde(default = "default_log_poll_interval_ms")]
    pub log_poll_interval_ms: u64,

    /// Seconds the engine waits before killing the container on stop.
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,

    /// Extra seconds the supervisor waits for a stop call to return.
    #[serde(default = "default_stop_grace_secs")]
    pub stop_grace_secs: u64,

    /// Readiness budget. `None` waits indefinitely.
    #[serde(default)]
    pub readiness_timeout_secs: Option<u64>,

    #[serde(default)]
    pub retry: RetryOptions,

    /// Directory for a daily rolling log file. Console only when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl SupervisorOptions {
    /// Never zero, even for options built without [`NodekeeperOptions::validate`].
    pub fn log_poll_interval(&self) -> Duration {
        Duration::from_millis(self.log_poll_interval_ms.max(1))
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    /// Upper bound on how long a stop call may take before it is abandoned.
    pub fn stop_deadline(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs.saturating_add(self.stop_grace_secs))
    }

    pub fn readiness_timeout(&self) -> Option<Duration> {
        self.readiness_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            log_poll_interval_ms: default_log_poll_interval_ms(),
            stop_timeout_secs: default_stop_timeout_secs(),
            stop_grace_secs: default_stop_grace_secs(),
            readiness_timeout_secs: None,
            retry: RetryOptions::default(),
            log_dir: None,
        }
    }
}

fn default_state_file() -> PathBuf {
    PathBuf::from(filenames::STATE_FILE)
}

fn default_log_poll_interval_ms() -> u64 {
    timing::LOG_POLL_INTERVAL_MS
}

fn default_stop_timeout_secs() -> u64 {
    timing::STOP_TIMEOUT_SECS
}

fn default_stop_grace_secs() -> u64 {
    timing::STOP_GRACE_SECS
}

/// Bounded exponential backoff for transport errors.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryOptions {
    #[serde(default = "default_retry_first_ms")]
    pub first_ms: u64,

    #[serde(default = "default_retry_max_ms")]
    pub max_ms: u64,

    #[serde(default = "default_retry_factor")]
    pub factor: f64,

    /// Total attempts including the first one.
    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: u32,
}

impl RetryOptions {
    pub fn policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(self.first_ms),
            max: Duration::from_millis(self.max_ms),
            factor: self.factor,
            max_attempts: self.max_attempts,
        }
    }
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            first_ms: default_retry_first_ms(),
            max_ms: default_retry_max_ms(),
            factor: default_retry_factor(),
            max_attempts: default_retry_max_attempts(),
        }
    }
}

fn default_retry_first_ms() -> u64 {
    500
}

fn default_retry_max_ms() -> u64 {
    10_000
}

fn default_retry_factor() -> f64 {
    2.0
}

fn default_retry_max_attempts() -> u32 {
    5
}
