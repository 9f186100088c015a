use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use nodekeeper::runtime::constants::envs;
use nodekeeper::{ContainerSpec, DockerDriver, NodekeeperOptions, Supervisor, SystemdNotifier};

use crate::commands;

#[derive(Parser, Debug)]
#[command(name = "nodekeeper", author, version, about = "Run and supervise a Cardano node container")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalFlags {
    /// Configuration file (default: $HOME/.nodekeeper.yaml)
    #[arg(long, global = true, env = envs::NODEKEEPER_CONFIG)]
    pub config: Option<PathBuf>,
}

impl GlobalFlags {
    pub fn load_options(&self) -> anyhow::Result<NodekeeperOptions> {
        Ok(NodekeeperOptions::load(self.config.as_deref())?)
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the node container and supervise it until shutdown
    Start(commands::start::StartArgs),

    /// Stop the recorded node container
    Stop(commands::stop::StopArgs),

    /// Show whether the recorded node container is running, leaving the state file as is
    Status(commands::status::StatusArgs),

    /// Download and patch the node configuration files
    Init(commands::init::InitArgs),
}

/// Supervisor wired to the local Docker engine and systemd.
pub fn docker_supervisor(options: &NodekeeperOptions) -> anyhow::Result<Supervisor> {
    let driver = Arc::new(DockerDriver::connect()?);
    Ok(Supervisor::new(
        driver,
        Arc::new(SystemdNotifier::new()),
        ContainerSpec::from_options(options),
        options.supervisor.clone(),
    ))
}
