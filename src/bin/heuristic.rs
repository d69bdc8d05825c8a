//! Heuristic predictor - scores a free-text factor without a trained model
//!
//! # Usage
//! ```sh
//! heuristic "LeBron scores over 25 points" NBA
//! ```
//!
//! Results are cached as JSON files under `FILE_CACHE_DIR`
//! (default `cache/heuristic`) for `FILE_CACHE_TTL_SECS`.

use anyhow::{Context, Result};
use clap::Parser;
use propcast::application::heuristic::HeuristicPredictor;
use propcast::config::CacheEnvConfig;
use propcast::domain::league::League;
use propcast::infrastructure::cache::FileCache;
use std::str::FromStr;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Factor text, e.g. "Chiefs win by 7"
    factor: String,

    /// League code (NBA, WNBA, NFL, MLB, NHL, MLS, EPL)
    league: String,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::WARN.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let args = Args::parse();
    if args.factor.trim().is_empty() {
        anyhow::bail!("Factor text must not be empty");
    }
    let league = League::from_str(&args.league).map_err(|e| anyhow::anyhow!(e))?;

    let config = CacheEnvConfig::from_env().context("Failed to load cache config")?;
    let cache = FileCache::new(&config.file_cache_dir, config.file_cache_ttl())?;
    let predictor = HeuristicPredictor::new(cache);

    let outcome = predictor.predict(&args.factor, league)?;
    if outcome.from_cache {
        info!("Served from file cache");
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&outcome.document).context("Failed to render result")?
    );
    Ok(())
}
