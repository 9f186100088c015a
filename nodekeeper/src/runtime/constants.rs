//! Constants for the nodekeeper runtime
//!
//! Centralized location for hardcoded values, paths and defaults.

pub mod envs {
    /// Overrides the configuration file location.
    pub const NODEKEEPER_CONFIG: &str = "NODEKEEPER_CONFIG";
}

/// File naming patterns
pub mod filenames {
    /// Configuration file looked up in the home directory.
    pub const CONFIG_FILE: &str = ".nodekeeper.yaml";

    /// Default state file recording the managed container.
    pub const STATE_FILE: &str = "/tmp/nodekeeper.state.yaml";

    /// Log file name used when file logging is enabled.
    pub const LOG_FILE: &str = "nodekeeper.log";
}

/// Node log contract
pub mod node_log {
    /// Log line the node prints once ledger replay has finished.
    pub const READINESS_MARKER: &str = "block replay progress (%) = 99";

    /// Tracing target used when re-emitting node output.
    pub const TARGET: &str = "node";
}

/// Supervisor timing defaults
pub mod timing {
    /// Interval between readiness log polls.
    pub const LOG_POLL_INTERVAL_MS: u64 = 2000;

    /// Seconds the engine waits before killing a stopping container.
    pub const STOP_TIMEOUT_SECS: u64 = 10;

    /// Extra seconds allowed on top of the engine stop timeout.
    pub const STOP_GRACE_SECS: u64 = 5;

    /// Upper bound for joining background tasks during shutdown.
    pub const TASK_JOIN_TIMEOUT_MS: u64 = 2000;

    /// Heartbeats are sent at this fraction of the watchdog interval.
    pub const WATCHDOG_DIVISOR: u32 = 3;
}

/// Cardano node defaults
pub mod cardano {
    pub const DEFAULT_IMAGE: &str = "inputoutput/cardano-node:latest";
    pub const BASE_CONTAINER: &str = "/cardano";
    pub const BASE_LOCAL_DIR: &str = "cardano";
    pub const DB: &str = "/db";
    pub const SOCKET: &str = "/ipc/node.socket";
    pub const HOST_ADDRESS: &str = "0.0.0.0";
    pub const PORT: &str = "3001";
    pub const PROMETHEUS_ADDRESS: &str = "0.0.0.0";
    pub const PROMETHEUS_PORT: u16 = 12798;

    /// Directory under the local base holding node configuration.
    pub const CONFIG_DIR: &str = "config";

    /// Directory under the local base used by RTView.
    pub const RT_VIEW_DIR: &str = "rt-view";

    /// Remote file name paired with the local name it is saved as.
    pub const CONFIG_FILES: &[(&str, &str)] = &[
        ("mainnet-config.json", "config.json"),
        ("mainnet-shelley-genesis.json", "mainnet-shelley-genesis.json"),
        ("mainnet-byron-genesis.json", "mainnet-byron-genesis.json"),
        ("mainnet-topology.json", "topology.json"),
    ];

    /// Main node configuration file (patched by init).
    pub const NODE_CONFIG_FILE: &str = "config.json";

    pub const TOPOLOGY_FILE: &str = "topology.json";
}
