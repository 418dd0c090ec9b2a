//! bake - BakeAssist command-line client
//!
//! Logs in against the BakeAssist API and keeps the session alive with the
//! shared session lifecycle manager.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod commands;
mod config;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive("bake=info".parse()?)
                .add_directive("bake_core=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = config::Config::load()?;

    // Execute command
    match cli.command {
        Commands::Auth(cmd) => commands::auth::handle(cmd.action, &config).await,
        Commands::Watch => commands::watch::execute(&config).await,
        Commands::Settings(cmd) => commands::settings::handle(cmd.action, &config).await,
        Commands::Sessions(cmd) => commands::sessions::handle(cmd.action, &config).await,
        Commands::Version => {
            println!("bake {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
