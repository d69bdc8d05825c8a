use crate::domain::ports::{DocumentFilter, DocumentStore, SortSpec, apply_query};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use tracing::debug;

/// Document store over the `documents` table.
///
/// Collection and league are pushed down to SQL; remaining filter fields,
/// sorting and the limit are applied in memory.
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn find(
        &self,
        collection: &str,
        filter: &DocumentFilter,
        sort: Option<&SortSpec>,
        limit: usize,
    ) -> Result<Vec<Value>> {
        let rows = match filter.get("league").and_then(Value::as_str) {
            Some(league) => sqlx::query(
                "SELECT body FROM documents WHERE collection = ? AND league = ? ORDER BY timestamp DESC",
            )
            .bind(collection)
            .bind(league)
            .fetch_all(&self.pool)
            .await,
            None => sqlx::query(
                "SELECT body FROM documents WHERE collection = ? ORDER BY timestamp DESC",
            )
            .bind(collection)
            .fetch_all(&self.pool)
            .await,
        }
        .with_context(|| format!("Failed to query collection {}", collection))?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            let body: String = row.try_get("body")?;
            documents.push(
                serde_json::from_str::<Value>(&body).context("Corrupt document body")?,
            );
        }
        debug!(
            "SqliteDocumentStore: {} candidate documents in {}",
            documents.len(),
            collection
        );

        Ok(apply_query(documents, filter, sort, limit))
    }

    async fn insert(&self, collection: &str, document: Value) -> Result<()> {
        let league = document
            .get("league")
            .and_then(Value::as_str)
            .map(str::to_string);
        let timestamp = document
            .get("timestamp")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let body = serde_json::to_string(&document).context("Failed to serialize document")?;

        sqlx::query(
            "INSERT INTO documents (collection, league, timestamp, body) VALUES (?, ?, ?, ?)",
        )
        .bind(collection)
        .bind(league)
        .bind(timestamp)
        .bind(body)
        .execute(&self.pool)
        .await
        .context("Failed to insert document")?;

        Ok(())
    }
}
