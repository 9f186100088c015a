//! Docker engine driver backed by bollard.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, LogOutput, LogsOptions,
    StartContainerOptions, StopContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, Mount, MountTypeEnum, PortBinding as DockerPortBinding};
use chrono::DateTime;
use futures::StreamExt;

use super::{ContainerDriver, ContainerId, ContainerSummary, LogCursor, LogLine};
use crate::errors::{NodekeeperError, NodekeeperResult};
use crate::spec::ContainerSpec;

/// [`ContainerDriver`] talking to the local Docker daemon.
///
/// The bollard client is cheap to clone and safe to share between tasks.
#[derive(Clone, Debug)]
pub struct DockerDriver {
    docker: Docker,
}

impl DockerDriver {
    /// Connect using `DOCKER_HOST` or the platform default socket.
    pub fn connect() -> NodekeeperResult<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(|e| {
            NodekeeperError::Transport(format!("failed to connect to docker: {}", e))
        })?;
        Ok(Self { docker })
    }

    fn container_config(spec: &ContainerSpec) -> Config<String> {
        let exposed_ports: HashMap<String, HashMap<(), ()>> = spec
            .exposed_ports
            .iter()
            .map(|p| (p.clone(), HashMap::new()))
            .collect();

        let mut port_bindings: HashMap<String, Option<Vec<DockerPortBinding>>> = HashMap::new();
        for binding in &spec.port_bindings {
            port_bindings
                .entry(binding.container_port.clone())
                .or_insert_with(|| Some(Vec::new()))
                .get_or_insert_with(Vec::new)
                .push(DockerPortBinding {
                    host_ip: Some(binding.host_ip.clone()),
                    host_port: Some(binding.host_port.clone()),
                });
        }

        let mounts = spec
            .mounts
            .iter()
            .map(|m| Mount {
                typ: Some(MountTypeEnum::BIND),
                source: Some(m.source.display().to_string()),
                target: Some(m.target.clone()),
                ..Default::default()
            })
            .collect();

        Config {
            image: Some(spec.image.clone()),
            hostname: Some(spec.hostname.clone()),
            cmd: Some(spec.cmd.clone()),
            tty: Some(false),
            exposed_ports: Some(exposed_ports),
            host_config: Some(HostConfig {
                mounts: Some(mounts),
                port_bindings: Some(port_bindings),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

/// Add `:latest` to untagged references so the engine does not pull every tag.
fn normalize_image_ref(image: &str) -> String {
    let name = image.rsplit('/').next().unwrap_or(image);
    if image.contains('@') || name.contains(':') {
        image.to_string()
    } else {
        format!("{}:latest", image)
    }
}

/// Split a timestamped log line (`<rfc3339> <text>`) into its parts.
fn parse_log_line(raw: &str) -> LogLine {
    if let Some((ts, text)) = raw.split_once(' ')
        && let Ok(parsed) = DateTime::parse_from_rfc3339(ts)
    {
        return LogLine {
            timestamp: Some(parsed.timestamp()),
            text: text.to_string(),
        };
    }
    LogLine::new(raw)
}

#[async_trait]
impl ContainerDriver for DockerDriver {
    async fn pull_image(&self, image: &str) -> NodekeeperResult<()> {
        let reference = normalize_image_ref(image);
        tracing::info!(image = %reference, "Pulling image");

        let options = CreateImageOptions {
            from_image: reference.as_str(),
            ..Default::default()
        };
        let mut stream = self.docker.create_image(Some(options), None, None);

        while let Some(progress) = stream.next().await {
            let info = progress?;
            if let Some(status) = info.status {
                tracing::debug!(
                    status = %status,
                    progress = info.progress.as_deref().unwrap_or(""),
                    "Pull progress"
                );
            }
        }

        tracing::info!(image = %reference, "Image pulled");
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> NodekeeperResult<ContainerId> {
        let response = self
            .docker
            .create_container(
                None::<CreateContainerOptions<String>>,
                Self::container_config(spec),
            )
            .await?;

        for warning in &response.warnings {
            tracing::warn!(container_id = %response.id, "Engine warning: {}", warning);
        }
        Ok(ContainerId::new(response.id))
    }

    async fn start_container(&self, id: &ContainerId) -> NodekeeperResult<()> {
        self.docker
            .start_container(id.as_str(), None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn stop_container(&self, id: &ContainerId, timeout: Duration) -> NodekeeperResult<()> {
        let options = StopContainerOptions {
            t: i64::try_from(timeout.as_secs()).unwrap_or(i64::MAX),
        };
        match self.docker.stop_container(id.as_str(), Some(options)).await {
            Ok(()) => Ok(()),
            // 304: container already stopped
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => {
                tracing::debug!(container_id = %id, "Container was already stopped");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn wait_exit(&self, id: &ContainerId) -> NodekeeperResult<i64> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };
        let mut stream = self.docker.wait_container(id.as_str(), Some(options));

        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports a non-zero exit as an error.
            Some(Err(bollard::errors::Error::DockerContainerWaitError { error, code })) => {
                if !error.is_empty() {
                    tracing::debug!(container_id = %id, code, "Wait reported: {}", error);
                }
                Ok(code)
            }
            Some(Err(e)) => Err(e.into()),
            None => Err(NodekeeperError::Transport(format!(
                "wait stream for container {} closed without a status",
                id
            ))),
        }
    }

    async fn fetch_logs(
        &self,
        id: &ContainerId,
        cursor: LogCursor,
    ) -> NodekeeperResult<Vec<LogLine>> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: false,
            follow: false,
            timestamps: true,
            since: cursor.since.unwrap_or(0),
            tail: "all".to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.logs(id.as_str(), Some(options));
        let mut lines = Vec::new();

        while let Some(chunk) = stream.next().await {
            let message = match chunk? {
                LogOutput::StdOut { message }
                | LogOutput::StdErr { message }
                | LogOutput::Console { message } => message,
                LogOutput::StdIn { .. } => continue,
            };
            let text = String::from_utf8_lossy(&message);
            lines.extend(
                text.lines()
                    .filter(|l| !l.is_empty())
                    .map(parse_log_line),
            );
        }

        Ok(lines)
    }

    async fn list_containers(&self) -> NodekeeperResult<Vec<ContainerSummary>> {
        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };
        let containers = self.docker.list_containers(Some(options)).await?;

        Ok(containers
            .into_iter()
            .filter_map(|c| {
                c.id.map(|id| ContainerSummary {
                    id: ContainerId::new(id),
                    state: c.state.unwrap_or_default(),
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{BindMount, PortBinding};
    use std::path::PathBuf;

    #[test]
    fn test_normalize_image_ref() {
        assert_eq!(normalize_image_ref("x"), "x:latest");
        assert_eq!(normalize_image_ref("x:1.35"), "x:1.35");
        assert_eq!(
            normalize_image_ref("registry:5000/org/node"),
            "registry:5000/org/node:latest"
        );
        assert_eq!(normalize_image_ref("org/node@sha256:abc"), "org/node@sha256:abc");
    }

    #[test]
    fn test_parse_timestamped_line() {
        let line = parse_log_line("2024-03-01T12:00:05.123456789Z [node] block replay progress");
        assert_eq!(line.text, "[node] block replay progress");
        assert_eq!(line.timestamp, Some(1_709_294_405));
    }

    #[test]
    fn test_parse_untimestamped_line() {
        let line = parse_log_line("plain output");
        assert_eq!(line.text, "plain output");
        assert_eq!(line.timestamp, None);
    }

    #[test]
    fn test_container_config_maps_spec() {
        let spec = ContainerSpec {
            image: "x:latest".into(),
            hostname: "poolRelay".into(),
            cmd: vec!["run".into()],
            exposed_ports: vec!["3001/tcp".into()],
            port_bindings: vec![PortBinding {
                container_port: "3001/tcp".into(),
                host_ip: "0.0.0.0".into(),
                host_port: "3001".into(),
            }],
            mounts: vec![BindMount {
                source: PathBuf::from("/srv/cardano"),
                target: "/cardano".into(),
            }],
        };

        let config = DockerDriver::container_config(&spec);
        assert_eq!(config.image.as_deref(), Some("x:latest"));
        assert_eq!(config.hostname.as_deref(), Some("poolRelay"));
        assert!(config.exposed_ports.unwrap().contains_key("3001/tcp"));

        let host_config = config.host_config.unwrap();
        let bindings = host_config.port_bindings.unwrap();
        let binding = &bindings["3001/tcp"].as_ref().unwrap()[0];
        assert_eq!(binding.host_port.as_deref(), Some("3001"));

        let mount = &host_config.mounts.unwrap()[0];
        assert_eq!(mount.typ, Some(MountTypeEnum::BIND));
        assert_eq!(mount.source.as_deref(), Some("/srv/cardano"));
    }
}
