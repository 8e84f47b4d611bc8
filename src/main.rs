//! Skriv CLI entry point.

use anyhow::Result;
use clap::Parser;
use skriv::cli::{commands, Cli, Commands};
use skriv::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("skriv={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Ensure the work directory exists
    std::fs::create_dir_all(settings.work_dir())?;

    // Execute command
    match &cli.command {
        Commands::Segment { input, output } => {
            commands::run_segment(input, output.clone(), settings).await?;
        }

        Commands::Chunk { input, run_id } => {
            commands::run_chunk(input, run_id.clone(), settings)?;
        }

        Commands::Plan {
            run_id,
            markers,
            duration,
            model,
        } => {
            commands::run_plan(run_id, markers.clone(), *duration, model.clone(), settings)
                .await?;
        }

        Commands::Dispatch {
            run_id,
            mode,
            retry_failed,
            model,
        } => {
            commands::run_dispatch(run_id, mode, *retry_failed, model.clone(), settings)
                .await?;
        }

        Commands::Merge { run_id, archive } => {
            commands::run_merge(run_id, *archive, settings)?;
        }

        Commands::Status { run_id } => {
            commands::run_status(run_id, settings)?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings)?;
        }
    }

    Ok(())
}
