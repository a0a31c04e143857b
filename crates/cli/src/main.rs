mod cli;

use std::fs;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use spikesort_core::{Dataset, SortConfig};
use spikesort_engine::SpikeSorter;

use crate::cli::CliArgs;

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let config: SortConfig = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file '{}'", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("failed to parse config file '{}'", path.display()))?
        }
        None => SortConfig::default(),
    };

    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read dataset '{}'", args.input.display()))?;
    let dataset: Dataset = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse dataset '{}'", args.input.display()))?;
    dataset.validate().context("dataset rejected")?;
    info!(events = dataset.len(), "dataset loaded");

    let result = SpikeSorter::new(config).sort(&dataset)?;

    let rendered =
        serde_json::to_string_pretty(&result).context("failed to serialize result")?;
    match &args.output {
        Some(path) => {
            fs::write(path, rendered)
                .with_context(|| format!("failed to write result to '{}'", path.display()))?;
            info!(output = %path.display(), "result written");
        }
        None => println!("{rendered}"),
    }

    Ok(())
}
