use std::path::PathBuf;

use clap::Parser;

/// Batch spike sorter.
///
/// Reads a recording of timestamped spike waveforms, clusters them into
/// putative units, and writes the per-event labeling with unit summaries.
#[derive(Parser, Debug)]
#[command(name = "spikesort", about = "Sort spike waveforms into putative units")]
pub struct CliArgs {
    /// Input dataset: JSON object with aligned `times` and `waveforms`
    pub input: PathBuf,

    /// Write the result (JSON) here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// TOML configuration file; omitted options keep their defaults
    #[arg(long)]
    pub config: Option<PathBuf>,
}
