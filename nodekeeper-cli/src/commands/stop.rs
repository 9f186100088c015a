use clap::Args;
use nodekeeper::{NodekeeperOptions, StateStore};

#[derive(Args, Debug)]
pub struct StopArgs {}

pub async fn execute(_args: StopArgs, options: &NodekeeperOptions) -> anyhow::Result<()> {
    // Nothing recorded means nothing to stop; no engine connection needed
    if StateStore::new(&options.supervisor.state_file).load().is_none() {
        println!("No node container recorded");
        return Ok(());
    }

    let supervisor = crate::cli::docker_supervisor(options)?;
    supervisor.reconcile().await?;

    match supervisor.stop().await? {
        Some(report) => {
            if let Some(e) = report.stop_error {
                anyhow::bail!("Failed to stop node container: {}", e);
            }
            if let Some(id) = report.container_id {
                println!("{}", id);
            }
        }
        None => println!("Node container is not running"),
    }
    Ok(())
}
