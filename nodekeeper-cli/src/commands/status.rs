use clap::Args;
use nodekeeper::{NodekeeperOptions, Reconciliation, StateStore};

#[derive(Args, Debug)]
pub struct StatusArgs {}

pub async fn execute(_args: StatusArgs, options: &NodekeeperOptions) -> anyhow::Result<()> {
    if StateStore::new(&options.supervisor.state_file).load().is_none() {
        println!("not running: no node container recorded");
        return Ok(());
    }

    let supervisor = crate::cli::docker_supervisor(options)?;
    match supervisor.inspect().await? {
        Reconciliation::Live(id) => println!("running: {}", id.short()),
        Reconciliation::Exited { id, state } => {
            println!("not running: container {} is {}", id.short(), state)
        }
        Reconciliation::Stale(id) => {
            println!("not running: container {} no longer exists", id.short())
        }
        Reconciliation::NoRecord => println!("not running: no node container recorded"),
    }
    Ok(())
}
