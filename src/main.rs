use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use spark_check::{
    Attachment, ChatOrchestrator, ConsumptionForecaster, GeminiClient, SystemClock,
    analyze_upload, config::AppConfig, server,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "spark-check")]
#[command(about = "Electricity consumption forecasting and document-grounded advice")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve,
    /// Fit on a local CSV or spreadsheet and print forecast and advisories
    Forecast {
        /// Dataset with `timestamp` and `consumo kwh` columns
        file: PathBuf,
    },
    /// Ask a one-shot question, optionally grounded on PDF documents
    Ask {
        prompt: String,
        /// PDF attachment (repeatable)
        #[arg(long = "file")]
        files: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .parse_lossy("spark_check=debug,tower_http=debug");

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    match args.command {
        Command::Serve => rt.block_on(server::serve(&config)),
        Command::Forecast { file } => run_forecast(&config, &file),
        Command::Ask { prompt, files } => rt.block_on(run_ask(&config, prompt, &files)),
    }
}

/// Fit on a local file and print the report as JSON
fn run_forecast(config: &AppConfig, file: &Path) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut forecaster = ConsumptionForecaster::new(config.model.artifact_path.clone());
    let report = analyze_upload(&filename, &bytes, &mut forecaster, &SystemClock)?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Send one question through the chat pipeline and print the answer
async fn run_ask(config: &AppConfig, prompt: String, files: &[PathBuf]) -> Result<()> {
    let mut attachments = Vec::with_capacity(files.len());
    for path in files {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        attachments.push(Attachment::new(name, bytes));
    }

    let client = GeminiClient::new(&config.generation)?;
    let chat = ChatOrchestrator::from_config(client, &config.generation);
    let answer = chat.handle(&prompt, attachments).await?;

    println!("{}", answer.text);
    Ok(())
}
