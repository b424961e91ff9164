mod assets;
mod auth;
mod cli;
mod cmr;
mod config;
mod download;
mod geometry;
mod parquet;

use anyhow::{Error, Result};
use clap::Parser;
use cli::{command, Cli, Commands};
use config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("emit_access=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    };

    let result = match cli.command {
        Commands::Login { strategy, persist } => command::login(&config, strategy, persist).await,
        Commands::Collections {
            keyword,
            provider,
            short_name,
        } => command::collections(&config, keyword, provider, short_name).await,
        Commands::Granules { search, parquet } => command::granules(&config, &search, parquet).await,
        Commands::Download { search, assets, dir } => {
            command::download(&config, &search, &assets, dir).await
        }
        Commands::Peek { url, bytes } => command::peek(&config, &url, bytes).await,
        Commands::S3Credentials {} => command::s3_credentials(&config).await,
    };

    match result {
        Ok(message) => println!("{}", message),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
