use clap::Args;
use nodekeeper::{NodekeeperOptions, node_config, spec};

#[derive(Args, Debug)]
pub struct InitArgs {}

pub async fn execute(_args: InitArgs, options: &NodekeeperOptions) -> anyhow::Result<()> {
    spec::prepare_host_dirs(options)?;
    node_config::init(options).await?;
    println!("{}", options.cardano.config_dir().display());
    Ok(())
}
