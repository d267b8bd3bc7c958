pub mod commands;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "crm-api")]
#[command(about = "Mini CRM API server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, short, help = "Port to listen on, overrides PORT")]
        port: Option<u16>,
    },

    #[command(about = "Create or update tables for every registered model")]
    Migrate,

    #[command(about = "Create the admin account and demo data on an empty database")]
    Seed,
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        environment = config.environment.as_str(),
        backend = ?config.database.backend,
        "Loaded configuration"
    );

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => commands::serve::handle(config, port).await,
        Commands::Migrate => commands::migrate::handle(config).await,
        Commands::Seed => commands::seed::handle(config).await,
    }
}
