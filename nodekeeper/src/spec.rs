//! Runtime spec provider.
//!
//! Turns [`NodekeeperOptions`] into the immutable [`ContainerSpec`] the
//! supervisor launches.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{NodekeeperError, NodekeeperResult};
use crate::runtime::constants::cardano;
use crate::runtime::options::NodekeeperOptions;

/// Host directory bind-mounted into the container.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindMount {
    pub source: PathBuf,
    pub target: String,
}

/// Container port published on the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    /// Container port in `port/proto` form.
    pub container_port: String,
    pub host_ip: String,
    pub host_port: String,
}

/// Everything needed to create the node container.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub image: String,
    pub hostname: String,
    /// Arguments passed to the image entrypoint, in order.
    pub cmd: Vec<String>,
    /// Exposed ports in `port/proto` form.
    pub exposed_ports: Vec<String>,
    pub port_bindings: Vec<PortBinding>,
    pub mounts: Vec<BindMount>,
}

impl ContainerSpec {
    /// Build the node container spec from configuration.
    pub fn from_options(options: &NodekeeperOptions) -> Self {
        let exposed_ports = exposed_ports(options);
        let port_bindings = exposed_ports
            .iter()
            .map(|port| PortBinding {
                container_port: port.clone(),
                host_ip: "0.0.0.0".to_string(),
                host_port: port.split('/').next().unwrap_or(port).to_string(),
            })
            .collect();

        Self {
            image: options.docker.image.clone(),
            hostname: container_name(options),
            cmd: node_command(options),
            exposed_ports,
            port_bindings,
            mounts: vec![BindMount {
                source: options.cardano.base_local.clone(),
                target: options.cardano.base_container.clone(),
            }],
        }
    }

    pub fn log_summary(&self) {
        tracing::info!(image = %self.image, hostname = %self.hostname, "container spec");
        tracing::info!(cmd = ?self.cmd, "cardano cmd");
        for port in &self.exposed_ports {
            tracing::info!(port = %port, "exposed port");
        }
        for mount in &self.mounts {
            tracing::info!(
                source = %mount.source.display(),
                target = %mount.target,
                "bind mount"
            );
        }
    }
}

/// Create the local node directory if it does not exist yet.
pub fn prepare_host_dirs(options: &NodekeeperOptions) -> NodekeeperResult<()> {
    let base = &options.cardano.base_local;
    if !base.exists() {
        std::fs::create_dir_all(base).map_err(|e| {
            NodekeeperError::Config(format!("creating dir path {}: {}", base.display(), e))
        })?;
        tracing::info!(path = %base.display(), "Created cardano base directory");
    }
    Ok(())
}

fn container_name(options: &NodekeeperOptions) -> String {
    let suffix = if options.node.producer {
        "Producer"
    } else {
        "Relay"
    };
    format!("{}{}", options.node.server_name, suffix)
}

fn exposed_ports(options: &NodekeeperOptions) -> Vec<String> {
    let mut ports = options.docker.expose_ports.clone();
    if !options.node.producer {
        let node_port = format!("{}/tcp", options.cardano.port);
        if !ports.contains(&node_port) {
            ports.push(node_port);
        }
    }
    ports
}

fn node_command(options: &NodekeeperOptions) -> Vec<String> {
    let c = &options.cardano;
    let base = &c.base_container;

    vec![
        "run".to_string(),
        "--database-path".to_string(),
        format!("{}{}", base, c.db),
        "--socket-path".to_string(),
        format!("{}{}", base, c.socket),
        "--port".to_string(),
        c.port.clone(),
        "--host-addr".to_string(),
        c.host_address.clone(),
        "--config".to_string(),
        format!(
            "{}/{}/{}",
            base,
            cardano::CONFIG_DIR,
            cardano::NODE_CONFIG_FILE
        ),
        "--topology".to_string(),
        format!("{}/{}/{}", base, cardano::CONFIG_DIR, cardano::TOPOLOGY_FILE),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn relay_options() -> NodekeeperOptions {
        let mut options = NodekeeperOptions::default();
        options.node.server_name = "pool".into();
        options.docker.image = "x".into();
        options.docker.expose_ports = vec!["12798/tcp".into()];
        options.cardano.base_local = PathBuf::from("/srv/cardano");
        options
    }

    #[test]
    fn test_relay_spec() {
        let spec = ContainerSpec::from_options(&relay_options());

        assert_eq!(spec.image, "x");
        assert_eq!(spec.hostname, "poolRelay");
        assert_eq!(spec.exposed_ports, vec!["12798/tcp", "3001/tcp"]);
        assert_eq!(spec.port_bindings.len(), 2);
        assert_eq!(spec.port_bindings[1].host_port, "3001");
        assert_eq!(spec.port_bindings[1].host_ip, "0.0.0.0");
        assert_eq!(
            spec.mounts,
            vec![BindMount {
                source: PathBuf::from("/srv/cardano"),
                target: "/cardano".into(),
            }]
        );
    }

    #[test]
    fn test_producer_does_not_expose_node_port() {
        let mut options = relay_options();
        options.node.producer = true;

        let spec = ContainerSpec::from_options(&options);
        assert_eq!(spec.hostname, "poolProducer");
        assert_eq!(spec.exposed_ports, vec!["12798/tcp"]);
    }

    #[test]
    fn test_node_command_order() {
        let spec = ContainerSpec::from_options(&relay_options());
        assert_eq!(
            spec.cmd,
            vec![
                "run",
                "--database-path",
                "/cardano/db",
                "--socket-path",
                "/cardano/ipc/node.socket",
                "--port",
                "3001",
                "--host-addr",
                "0.0.0.0",
                "--config",
                "/cardano/config/config.json",
                "--topology",
                "/cardano/config/topology.json",
            ]
        );
    }

    #[test]
    fn test_node_port_not_duplicated() {
        let mut options = relay_options();
        options.docker.expose_ports = vec!["3001/tcp".into()];

        let spec = ContainerSpec::from_options(&options);
        assert_eq!(spec.exposed_ports, vec!["3001/tcp"]);
    }

    #[test]
    fn test_prepare_host_dirs_creates_base() {
        let temp = TempDir::new().unwrap();
        let mut options = NodekeeperOptions::default();
        options.cardano.base_local = temp.path().join("nested").join("cardano");

        prepare_host_dirs(&options).unwrap();
        assert!(options.cardano.base_local.is_dir());

        // Second call is a no-op
        prepare_host_dirs(&options).unwrap();
    }
}
