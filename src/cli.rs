//! CLI argument parsing for Veredicto

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for the analysis report
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text summary (default)
    Text,
    /// HTML summary fragment for report embedding
    Html,
    /// Full JSON report for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "veredicto")]
#[command(version)]
#[command(about = "Statistical anomaly detection for performance test metrics", long_about = None)]
pub struct Cli {
    /// JSON file with the merged metric frame:
    /// {"metrics": [{"name": ..., "data": [{"timestamp": ..., "value": ...}]}]}
    pub input: PathBuf,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// JSON file with ml_analysis settings overriding the defaults
    #[arg(short = 's', long = "settings", value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Load metric column name (overrides settings)
    #[arg(long = "load-metric", value_name = "METRIC")]
    pub load_metric: Option<String>,

    /// Enable debug tracing to stderr
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,
}
