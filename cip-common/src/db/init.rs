//! Database initialization
//!
//! Creates the pipeline store on first run. Schema creation is idempotent and safe
//! to call on every startup.
//!
//! Tables:
//! - `pipelines`: one row per pipeline run (status, current stage, gate results)
//! - `stage_outputs`: append-only stage payloads, latest row per stage is authoritative
//! - `audit_log`: append-only history of automated and human actions
//! - `brand_corpus`: chunked brand-voice reference content with embeddings

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Default SQLite busy timeout
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Open (creating if needed) the database file and ensure the schema exists
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        // WAL allows concurrent readers with one writer across pipelines
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;
    Ok(pool)
}

/// In-memory database with the full schema.
///
/// Limited to a single connection because every SQLite memory connection is a
/// separate database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;
    Ok(pool)
}

/// Create all tables and indexes (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_pipelines_table(pool).await?;
    create_stage_outputs_table(pool).await?;
    create_audit_log_table(pool).await?;
    create_brand_corpus_table(pool).await?;

    info!("Database schema ready");
    Ok(())
}

async fn create_pipelines_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipelines (
            id TEXT PRIMARY KEY,
            source_url TEXT NOT NULL,
            current_stage INTEGER NOT NULL DEFAULT 0 CHECK (current_stage BETWEEN 0 AND 8),
            status TEXT NOT NULL DEFAULT 'running',
            safety_decision TEXT,
            quality_score REAL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_pipelines_status ON pipelines(status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_pipelines_updated_at ON pipelines(updated_at)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_stage_outputs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stage_outputs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            pipeline_id TEXT NOT NULL REFERENCES pipelines(id),
            stage INTEGER NOT NULL CHECK (stage BETWEEN 1 AND 8),
            output_json TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_stage_outputs_pipeline_stage ON stage_outputs(pipeline_id, stage)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_audit_log_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            pipeline_id TEXT NOT NULL REFERENCES pipelines(id),
            event_type TEXT NOT NULL,
            reviewer TEXT,
            metadata TEXT,
            timestamp TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_log_pipeline ON audit_log(pipeline_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_brand_corpus_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS brand_corpus (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            document TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            content TEXT NOT NULL,
            topic TEXT NOT NULL,
            technical_level TEXT NOT NULL,
            embedding TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (document, chunk_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;
    use tempfile::TempDir;

    async fn table_names(pool: &SqlitePool) -> Vec<String> {
        sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(pool)
            .await
            .unwrap()
            .into_iter()
            .map(|row| row.get::<String, _>("name"))
            .collect()
    }

    #[tokio::test]
    async fn test_memory_database_has_all_tables() {
        let pool = init_memory_database().await.unwrap();
        let tables = table_names(&pool).await;
        for expected in ["audit_log", "brand_corpus", "pipelines", "stage_outputs"] {
            assert!(tables.contains(&expected.to_string()), "missing table {}", expected);
        }
    }

    #[tokio::test]
    async fn test_schema_creation_is_idempotent() {
        let pool = init_memory_database().await.unwrap();
        create_schema(&pool).await.unwrap();
        create_schema(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_database_created_with_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("nested").join("pipeline.db");
        let pool = init_database(&db_path).await.unwrap();
        assert!(db_path.exists());
        assert!(table_names(&pool).await.len() >= 4);
        pool.close().await;

        // Re-opening an existing file keeps working
        let reopened = init_database(&db_path).await.unwrap();
        reopened.close().await;
    }

    #[tokio::test]
    async fn test_stage_number_constraint() {
        let pool = init_memory_database().await.unwrap();
        sqlx::query(
            "INSERT INTO pipelines (id, source_url, created_at, updated_at) VALUES ('p1', 'https://a.io', 'x', 'x')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let result = sqlx::query(
            "INSERT INTO stage_outputs (pipeline_id, stage, output_json, created_at) VALUES ('p1', 9, '{}', 'x')",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }
}
