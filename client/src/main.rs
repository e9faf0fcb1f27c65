// DeepResearch terminal client
// Main entry point for the deepresearch binary

use anyhow::Context;
use clap::Parser;
use deepresearch_client::cli::{Cli, Command};
use deepresearch_client::config::Config;
use deepresearch_client::handlers::{
    handle_ask, handle_cancel, handle_chat, handle_research, handle_status, OutputFormat,
};
use deepresearch_client::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration (or use custom path if provided)
    let mut config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --base-url wins over both the file and the environment
    if let Some(base_url) = &cli.base_url {
        config.api.base_url = base_url.clone();
        config.validate().context("Invalid --base-url")?;
    }

    // Logging goes to stderr; --log wins over the configured level
    // (RUST_LOG wins over both)
    let log_level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(log_level);

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");

    tracing::info!("DeepResearch client v{} ({} - {})", version, commit, timestamp);
    tracing::info!("Research backend: {}", config.api.base_url);

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Handle commands
    match cli.command {
        Command::Chat => {
            tracing::info!("Starting interactive chat");
            handle_chat(&config).await
        }

        Command::Research {
            topic,
            requirements,
            yes,
            output,
        } => {
            tracing::info!("Researching: {}", topic);
            handle_research(topic, requirements, yes, output, &config, format).await
        }

        Command::Status { process_id } => {
            tracing::info!("Fetching status of {}", process_id);
            handle_status(process_id, &config, format).await
        }

        Command::Cancel { process_id } => {
            tracing::info!("Cancelling {}", process_id);
            handle_cancel(process_id, &config, format).await
        }

        Command::Ask { question } => {
            tracing::info!("Asking: {}", question);
            handle_ask(question, &config, format).await
        }
    }
}
