//! holdcv - Main Entry Point
//!
//! Tunes SVM, MLP, decision tree and random forest classifiers on a stored split.

use clap::Parser;
use holdcv::cli::{cmd_compare, cmd_spaces, cmd_tune, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "holdcv=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Tune { data, folds, config, seed, output } => {
            cmd_tune(&data, folds, config.as_deref(), seed, output.as_deref())?;
        }
        Commands::Compare { data, folds, config, seed, output } => {
            cmd_compare(&data, folds, config.as_deref(), seed, output.as_deref())?;
        }
        Commands::Spaces { config } => {
            cmd_spaces(config.as_deref())?;
        }
    }

    Ok(())
}
