use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use tracing_subscriber::EnvFilter;
use veredicto::{
    cli::{Cli, OutputFormat},
    config::EngineConfig,
    engine::AnalysisEngine,
    frame::MetricFrame,
};

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Input document: the merged frame as the data collaborators export it
#[derive(Debug, Deserialize)]
struct InputDocument {
    metrics: Vec<InputMetric>,
}

#[derive(Debug, Deserialize)]
struct InputMetric {
    name: String,
    data: Vec<InputPoint>,
}

#[derive(Debug, Deserialize)]
struct InputPoint {
    timestamp: i64,
    value: f64,
}

/// Build a frame from the input document.
///
/// All metrics must share one timestamp index; the collaborators merge
/// series before export, so a mismatch is a malformed file.
fn build_frame(doc: InputDocument) -> Result<MetricFrame> {
    let first = doc
        .metrics
        .first()
        .context("input contains no metrics")?;
    let timestamps: Vec<i64> = first.data.iter().map(|p| p.timestamp).collect();

    let mut columns = BTreeMap::new();
    for metric in &doc.metrics {
        let these: Vec<i64> = metric.data.iter().map(|p| p.timestamp).collect();
        if these != timestamps {
            anyhow::bail!(
                "metric '{}' has a different timestamp index than '{}'; \
                 merge series before analysis",
                metric.name,
                first.name
            );
        }
        columns.insert(
            metric.name.clone(),
            metric.data.iter().map(|p| p.value).collect(),
        );
    }
    MetricFrame::new(timestamps, columns).context("malformed metric frame")
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.settings {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read settings file {}", path.display()))?;
            let settings: BTreeMap<String, serde_json::Value> = serde_json::from_str(&raw)
                .with_context(|| format!("settings file {} is not a JSON object", path.display()))?;
            EngineConfig::from_settings(&settings)
        }
        None => EngineConfig::default(),
    };
    if let Some(load_metric) = &cli.load_metric {
        config.load_metric = load_metric.clone();
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let raw = fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read input file {}", cli.input.display()))?;
    let doc: InputDocument = serde_json::from_str(&raw)
        .with_context(|| format!("input file {} is not valid JSON", cli.input.display()))?;
    let frame = build_frame(doc)?;

    let engine = AnalysisEngine::new(load_config(&cli)?)?;
    let report = engine.analyze(&frame)?;

    match cli.format {
        OutputFormat::Text => print!("{}", report.summary.to_text()),
        OutputFormat::Html => print!("{}", report.summary.to_html()),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    if !report.summary.performance_status {
        std::process::exit(1);
    }
    Ok(())
}
