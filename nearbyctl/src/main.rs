//! This is a command-line tool to store places and search for them by
//! distance via [libnearby]
use crate::{cli::*, config::*};
use anyhow::Result;
use clap::Parser;
use libnearby::{Database, service::Service};
use tracing::debug;
use tracing_subscriber::filter::EnvFilter;

mod cli;
mod commands;
mod config;
mod output;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("NEARBYCTL_LOG"))
        .init();
    let args = Cli::parse();
    let config_file = config_file()?;
    let cfg = Config::load_from_file(&config_file).await.ok();

    if let Commands::Config { path, tolerance } = args.command {
        let mut cfg = cfg.unwrap_or_default();
        if let Some(path) = path {
            cfg.database = path;
        }
        if let Some(tolerance) = tolerance {
            cfg.dedup_tolerance = tolerance;
        }
        cfg.save_to_file(&config_file).await?;
        println!("Saved settings to '{}'", config_file.to_string_lossy());
        return Ok(());
    }

    let cfg = cfg.unwrap_or_default();
    let database = args.database.unwrap_or(cfg.database);
    debug!(?database, tolerance = cfg.dedup_tolerance, "opening database");
    let db = Database::open(&database).await?;
    let service = Service::new(db).with_tolerance(cfg.dedup_tolerance);

    match args.command {
        Commands::Status => {
            println!("Using database '{}'", database.to_string_lossy());
            println!(
                "Locations closer than {} m are treated as duplicates",
                service.tolerance()
            );
            println!("{} locations stored", service.count().await?);
            Ok(())
        }
        command => commands::handle_command(command, &service).await,
    }
}
