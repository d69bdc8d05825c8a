//! propcast - sports outcome prediction service
//!
//! Requests are JSON documents; responses go to stdout, logs to stderr.
//!
//! # Usage
//! ```sh
//! propcast predict '{"league":"NBA","prediction_type":"single_factor","input_data":{"team":"Lakers"}}'
//! cat requests.ndjson | propcast serve
//! propcast import --league NBA --input games.csv
//! propcast train --league NBA
//! propcast status
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use propcast::application::monitoring::MemoryMonitor;
use propcast::application::prediction::{PredictionContext, PredictionOrchestrator};
use propcast::application::system::WorkerPool;
use propcast::application::training::import_games;
use propcast::config::Config;
use propcast::domain::league::League;
use propcast::domain::prediction::{PredictionRequest, PredictionType};
use propcast::infrastructure::observability::MetricsReporter;
use serde_json::{Value, json};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader as AsyncBufReader};
use tokio::sync::watch;
use tracing::{Level, error, info, warn};
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve one request given as an argument or on stdin
    Predict {
        /// JSON request; read from stdin when omitted
        request: Option<String>,
    },
    /// Serve newline-delimited JSON requests from stdin until EOF or Ctrl+C
    Serve,
    /// Train (or retrain) the models of one league
    Train {
        #[arg(long)]
        league: String,
    },
    /// Load historical games from a CSV file
    Import {
        #[arg(long)]
        league: String,
        #[arg(long)]
        input: PathBuf,
    },
    /// Print breaker and model status
    Status,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    // stdout carries responses, so logs go to stderr
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stderr_layer)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    match cli.command {
        Command::Predict { request } => predict(config, request).await,
        Command::Serve => serve(config).await,
        Command::Train { league } => train(config, &league).await,
        Command::Import { league, input } => import(config, &league, &input).await,
        Command::Status => status(config).await,
    }
}

fn parse_league(raw: &str) -> Result<League> {
    League::from_str(raw).map_err(|e| anyhow::anyhow!(e))
}

async fn predict(config: Config, request: Option<String>) -> Result<ExitCode> {
    let raw = match request {
        Some(body) => body,
        None => {
            let mut body = String::new();
            std::io::stdin()
                .read_to_string(&mut body)
                .context("Failed to read request from stdin")?;
            body
        }
    };
    let value: Value = serde_json::from_str(&raw).context("Request is not valid JSON")?;

    let ctx = PredictionContext::build(config).await?;
    let orchestrator = PredictionOrchestrator::new(ctx);
    let response = orchestrator.handle_json(&value).await;

    println!("{}", response.to_json());
    Ok(if response.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn serve(config: Config) -> Result<ExitCode> {
    info!("propcast {} serving NDJSON on stdin", env!("CARGO_PKG_VERSION"));

    let pool = WorkerPool::new(config.resilience.worker_pool_size);
    let observability = config.observability.clone();
    let ctx = PredictionContext::build(config).await?;
    let orchestrator = Arc::new(PredictionOrchestrator::new(ctx.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut background = Vec::new();
    if observability.enabled {
        let reporter = MetricsReporter::new(
            ctx.breakers.clone(),
            ctx.metrics.clone(),
            observability.report_interval(),
        );
        background.push(tokio::spawn(reporter.run(shutdown_rx.clone())));
    }
    background.push(tokio::spawn(
        MemoryMonitor::new(ctx.clone()).run(shutdown_rx.clone()),
    ));

    let mut lines = AsyncBufReader::new(tokio::io::stdin()).lines();
    let mut in_flight = Vec::new();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        };
        let Some(line) = line else {
            info!("Input closed");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let orchestrator = orchestrator.clone();
        let handle = pool
            .spawn(async move {
                let response = match serde_json::from_str::<Value>(&line) {
                    Ok(value) => orchestrator.handle_json(&value).await.to_json(),
                    Err(e) => json!({
                        "error": true,
                        "kind": "validation_error",
                        "message": format!("Invalid request: malformed JSON: {}", e),
                        "input": line,
                    }),
                };
                println!("{}", response);
            })
            .await?;
        in_flight.push(handle);
        in_flight.retain(|h| !h.is_finished());
    }

    for handle in in_flight {
        if let Err(e) = handle.await {
            warn!("Request task failed: {}", e);
        }
    }

    let _ = shutdown_tx.send(true);
    for handle in background {
        if let Err(e) = handle.await {
            error!("Background task failed: {}", e);
        }
    }
    info!("Stopped");
    Ok(ExitCode::SUCCESS)
}

async fn train(config: Config, league: &str) -> Result<ExitCode> {
    let league = parse_league(league)?;
    let ctx = PredictionContext::build(config).await?;

    let entry = ctx.trainer.train(league).await.context("Training failed")?;
    println!(
        "{}",
        json!({
            "league": league,
            "model_version": entry.version,
            "trained_at": entry.trained_at,
            "training_samples": entry.training_samples,
            "synthetic_samples": entry.synthetic_samples,
            "metrics": entry.metrics,
            "feature_importance": entry.top_features(5),
        })
    );
    Ok(ExitCode::SUCCESS)
}

async fn import(config: Config, league: &str, input: &Path) -> Result<ExitCode> {
    let league = parse_league(league)?;
    if config.database_url.is_none() {
        warn!("DATABASE_URL not set: imported games only live for this process");
    }
    let file = File::open(input).with_context(|| format!("Failed to open {:?}", input))?;
    let ctx = PredictionContext::build(config).await?;

    let summary = import_games(ctx.documents.as_ref(), league, BufReader::new(file)).await?;
    println!(
        "{}",
        json!({
            "league": league,
            "imported": summary.imported,
            "labelled": summary.labelled,
            "skipped": summary.skipped,
        })
    );
    Ok(ExitCode::SUCCESS)
}

async fn status(config: Config) -> Result<ExitCode> {
    let ctx = PredictionContext::build(config).await?;
    let orchestrator = PredictionOrchestrator::new(ctx);

    let mut input = serde_json::Map::new();
    input.insert("probe".to_string(), json!(true));
    let request = PredictionRequest::new(League::Nba, PredictionType::HealthCheck, input);
    let response = orchestrator.predict(request).await;

    println!("{}", response.to_json());
    Ok(if response.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
