use anyhow::{Context, Result};
use clap::Parser;
use pipeline::{Collaborators, LogFormat, Pipeline, PipelineConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Turns a folder of documents into a knowledge graph, a vector index and
/// evaluated answers
#[derive(Parser, Debug)]
#[command(name = "ragpipe", version)]
struct Cli {
    /// Folder with the input documents
    folder: PathBuf,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the configured output directory
    #[arg(long)]
    output: Option<PathBuf>,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = PipelineConfig::load(cli.config.as_deref())?;
    if let Some(output) = cli.output {
        config.output_dir = output;
    }
    init_tracing(config.log_format);

    info!(folder = %cli.folder.display(), output = %config.output_dir.display(), "Starting pipeline");

    let collaborators = Collaborators::from_config(&config)?;
    let pipeline = Pipeline::new(config, collaborators);
    let report = pipeline.run(&cli.folder).await?;

    let metrics = pipeline.metrics().snapshot();
    info!(
        llm_failures = metrics.llm_failures,
        store_failures = metrics.store_failures,
        "Run metrics"
    );

    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    println!("{}", json);
    Ok(())
}
