//! Kolosal Drift - Main Entry Point

use clap::Parser;
use kolosal_drift::cli::{cmd_config, cmd_detect, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kolosal_drift=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Detect {
            reference,
            current,
            target,
            config,
            model_id,
            tracking,
            json,
        } => {
            cmd_detect(
                &reference,
                &current,
                target.as_deref(),
                config.as_deref(),
                &model_id,
                tracking.as_deref(),
                json,
            )?;
        }
        Commands::Config { config } => {
            cmd_config(config.as_deref())?;
        }
    }

    Ok(())
}
