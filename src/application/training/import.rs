//! CSV import of historical games into the document store.

use crate::application::training::dataset::{GAMES_COLLECTION, GameRow, input_from_record, parse_outcome};
use crate::domain::league::League;
use crate::domain::ports::DocumentStore;
use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::Value;
use std::io::Read;
use tracing::{info, warn};

/// Counts from one import run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub labelled: usize,
    pub skipped: usize,
}

/// Load games from CSV. Every column except `outcome` and `timestamp`
/// becomes an `input_data` attribute. Rows without a `timestamp` column are
/// stamped in file order starting at the current time.
pub async fn import_games<R: Read>(
    documents: &dyn DocumentStore,
    league: League,
    reader: R,
) -> Result<ImportSummary> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers().context("Failed to read CSV header")?.clone();
    let base_ts = Utc::now().timestamp_millis();
    let mut summary = ImportSummary::default();

    for (idx, record) in rdr.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!("Import: Skipping malformed row {}: {}", idx + 1, e);
                summary.skipped += 1;
                continue;
            }
        };

        let mut outcome = None;
        let mut timestamp = None;
        let mut pairs = Vec::new();
        for (key, raw) in headers.iter().zip(record.iter()) {
            match key.trim() {
                "outcome" => outcome = parse_outcome(&Value::String(raw.to_string())),
                "timestamp" => timestamp = raw.trim().parse::<i64>().ok(),
                _ => pairs.push((key, raw)),
            }
        }

        let input_data = input_from_record(pairs);
        if input_data.is_empty() {
            summary.skipped += 1;
            continue;
        }

        let row = GameRow {
            league,
            timestamp: timestamp.unwrap_or(base_ts + idx as i64),
            input_data,
            outcome,
        };
        documents
            .insert(GAMES_COLLECTION, row.to_document())
            .await
            .with_context(|| format!("Failed to store row {}", idx + 1))?;

        summary.imported += 1;
        if outcome.is_some() {
            summary.labelled += 1;
        }
    }

    info!(
        "Import: {} rows for {} ({} labelled, {} skipped)",
        summary.imported, league, summary.labelled, summary.skipped
    );
    Ok(summary)
}
