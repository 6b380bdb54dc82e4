mod config;
mod error;

use clap::Parser;
use config::{Cli, Commands};

mod cmd;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Declare(args) => cmd::declare::run(args),
        Commands::Check(args) => cmd::check::run(args),
        Commands::Run(args) => cmd::run::run(args).await,
    };
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
