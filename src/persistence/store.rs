//! SQLite-based run store

use crate::core::ExecutionStatus;
use crate::persistence::{RunRecord, RunStore};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const SELECT_RUNS: &str = r#"
    SELECT run_id, pipeline_name, config_hash, status, timestamp, article_count, identifiers, new_identifiers
    FROM runs
"#;

/// SQLite run store
pub struct SqliteRunStore {
    pool: SqlitePool,
}

impl SqliteRunStore {
    /// Open (creating if needed) a store at `db_path`; `:memory:` is accepted
    pub async fn new(db_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);

        // One connection, so an in-memory database is shared by every query
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to database: {}", db_path))?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    /// Default database location
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("litpipe")
            .join("runs.db")
    }

    /// Open a store at `path`, creating its directory
    pub async fn at_path(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        let db_path = path
            .to_str()
            .ok_or_else(|| anyhow!("Database path is not valid UTF-8: {}", path.display()))?;
        Self::new(db_path).await
    }

    /// Create store with default path
    pub async fn with_default_path() -> Result<Self> {
        Self::at_path(&Self::default_path()).await
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                run_id TEXT PRIMARY KEY,
                pipeline_name TEXT NOT NULL,
                config_hash TEXT NOT NULL,
                status TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                article_count INTEGER NOT NULL DEFAULT 0,
                identifiers TEXT NOT NULL DEFAULT '[]',
                new_identifiers TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_runs_pipeline_name ON runs(pipeline_name);
            CREATE INDEX IF NOT EXISTS idx_runs_timestamp ON runs(timestamp);
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to initialize run store schema")?;

        Ok(())
    }

    /// Convert DateTime<Utc> to NaiveDateTime for SQLite
    fn to_naive(dt: DateTime<Utc>) -> NaiveDateTime {
        dt.naive_utc()
    }

    /// Convert NaiveDateTime to DateTime<Utc>
    fn from_naive(dt: NaiveDateTime) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(dt, Utc)
    }

    fn from_row(row: &SqliteRow) -> Result<RunRecord> {
        let status: String = row.get("status");
        let identifiers: String = row.get("identifiers");
        let new_identifiers: String = row.get("new_identifiers");

        Ok(RunRecord {
            run_id: Uuid::parse_str(&row.get::<String, _>("run_id"))?,
            pipeline_name: row.get("pipeline_name"),
            config_hash: row.get("config_hash"),
            status: ExecutionStatus::parse(&status)
                .ok_or_else(|| anyhow!("Unknown run status '{}'", status))?,
            timestamp: Self::from_naive(row.get("timestamp")),
            article_count: row.get::<i64, _>("article_count") as usize,
            identifiers: serde_json::from_str(&identifiers).context("Corrupt identifiers column")?,
            new_identifiers: serde_json::from_str(&new_identifiers).context("Corrupt new_identifiers column")?,
        })
    }
}

#[async_trait::async_trait]
impl RunStore for SqliteRunStore {
    async fn save_run(&self, record: &RunRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO runs
            (run_id, pipeline_name, config_hash, status, timestamp, article_count, identifiers, new_identifiers)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(record.run_id.to_string())
        .bind(&record.pipeline_name)
        .bind(&record.config_hash)
        .bind(record.status.as_str())
        .bind(Self::to_naive(record.timestamp))
        .bind(record.article_count as i64)
        .bind(serde_json::to_string(&record.identifiers)?)
        .bind(serde_json::to_string(&record.new_identifiers)?)
        .execute(&self.pool)
        .await
        .context("Failed to save run")?;

        Ok(())
    }

    async fn latest_run(&self, pipeline_name: &str) -> Result<Option<RunRecord>> {
        let row = sqlx::query(&format!(
            "{} WHERE pipeline_name = ?1 ORDER BY timestamp DESC, rowid DESC LIMIT 1",
            SELECT_RUNS
        ))
        .bind(pipeline_name)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get latest run")?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn list_runs(&self, pipeline_name: &str) -> Result<Vec<RunRecord>> {
        let rows = sqlx::query(&format!(
            "{} WHERE pipeline_name = ?1 ORDER BY timestamp DESC, rowid DESC",
            SELECT_RUNS
        ))
        .bind(pipeline_name)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list runs")?;

        rows.iter().map(Self::from_row).collect()
    }

    async fn list_pipelines(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT pipeline_name
            FROM runs
            ORDER BY pipeline_name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list pipelines")?;

        Ok(rows.iter().map(|row| row.get("pipeline_name")).collect())
    }
}
