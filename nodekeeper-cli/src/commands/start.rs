use clap::Args;
use nodekeeper::{NodekeeperOptions, StartOutcome, node_config, signals, spec};

#[derive(Args, Debug)]
pub struct StartArgs {
    /// Give up if the node is not ready after this many seconds
    #[arg(long, value_name = "SECS")]
    pub readiness_timeout: Option<u64>,
}

/// Returns the process exit code for the shutdown that ended supervision.
pub async fn execute(args: StartArgs, options: &NodekeeperOptions) -> anyhow::Result<i32> {
    let mut options = options.clone();
    if args.readiness_timeout.is_some() {
        options.supervisor.readiness_timeout_secs = args.readiness_timeout;
    }

    spec::prepare_host_dirs(&options)?;
    node_config::check_config_files(&options)?;
    options.log_summary();

    let supervisor = crate::cli::docker_supervisor(&options)?;

    // Listen before launching so an early Ctrl+C is not lost
    let signals = signals::listen()?;

    match supervisor.start().await? {
        StartOutcome::AlreadyRunning(id) => {
            println!("Node container {} is already running", id.short());
            return Ok(0);
        }
        StartOutcome::Launched(id) => println!("{}", id),
    }

    let report = supervisor.run(signals).await?;
    if let Some(e) = &report.stop_error {
        eprintln!("Warning: container may still be running: {}", e);
    }
    Ok(report.exit_code())
}
