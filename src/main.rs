//! toxiflow - Main Entry Point

use clap::Parser;
use toxiflow::cli::{cmd_models, cmd_predict, cmd_train, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "toxiflow=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train { source, schema, artifact_dir, model_dir } => {
            cmd_train(&source, schema, artifact_dir, model_dir)?;
        }
        Commands::Predict { data, output, model_dir } => {
            cmd_predict(&data, output.as_deref(), model_dir)?;
        }
        Commands::Models { model_dir } => {
            cmd_models(model_dir)?;
        }
    }

    Ok(())
}
