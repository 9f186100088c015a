mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use nodekeeper::supervisor::exit_codes;
use nodekeeper::util::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let options = match cli.global.load_options() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(exit_codes::FAULT);
        }
    };
    let guard = init_logging(options.supervisor.log_dir.as_deref());

    let result = match cli.command {
        Commands::Start(args) => commands::start::execute(args, &options).await,
        Commands::Stop(args) => commands::stop::execute(args, &options).await.map(|_| 0),
        Commands::Status(args) => commands::status::execute(args, &options).await.map(|_| 0),
        Commands::Init(args) => commands::init::execute(args, &options).await.map(|_| 0),
    };

    let code = match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            exit_codes::FAULT
        }
    };

    // Flush the file writer before exiting
    drop(guard);
    std::process::exit(code);
}
