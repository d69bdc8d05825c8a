use anyhow::{Context, Result};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

/// SQLite connection pool with the document schema applied
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        // File-backed URLs need their directory in place before connecting
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create database directory")?;
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        info!("Database: Connected to {} (document store)", db_url);

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    /// One table holds every collection; league and timestamp are lifted
    /// out of the body so game lookups can use the index.
    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                league TEXT,
                timestamp INTEGER NOT NULL DEFAULT 0,
                body TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create documents table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_documents_collection_league_time
            ON documents (collection, league, timestamp);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create documents index")?;

        Ok(())
    }
}
