//! Stage output operations
//!
//! Rows are append-only. The authoritative output for a (pipeline, stage) is
//! the row with the latest `created_at`, ties broken by the higher `id`.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use uuid::Uuid;

use cip_common::time::{now, parse_db_string, to_db_string};
use cip_common::{Error, Result};

use super::parse_uuid;
use crate::models::{Stage, StageOutputRecord};
use crate::utils::retry_on_lock;

/// Append a stage output, returning the new row id
pub async fn save_stage_output(
    pool: &SqlitePool,
    pipeline_id: Uuid,
    stage: Stage,
    output: &serde_json::Value,
    max_wait_ms: u64,
) -> Result<i64> {
    let pipeline_id = pipeline_id.to_string();
    let output_json = serde_json::to_string(output)
        .map_err(|e| Error::Internal(format!("Failed to serialize stage output: {}", e)))?;
    let created_at = to_db_string(&now());

    retry_on_lock("save_stage_output", max_wait_ms, || async {
        let result = sqlx::query(
            "INSERT INTO stage_outputs (pipeline_id, stage, output_json, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&pipeline_id)
        .bind(i64::from(stage.number()))
        .bind(&output_json)
        .bind(&created_at)
        .execute(pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.last_insert_rowid())
    })
    .await
}

/// Latest output of every stage that has run
pub async fn get_latest_outputs(
    pool: &SqlitePool,
    pipeline_id: Uuid,
) -> Result<BTreeMap<Stage, StageOutputRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, pipeline_id, stage, output_json, created_at
        FROM stage_outputs
        WHERE pipeline_id = ?
        ORDER BY stage ASC, created_at DESC, id DESC
        "#,
    )
    .bind(pipeline_id.to_string())
    .fetch_all(pool)
    .await?;

    let mut latest = BTreeMap::new();
    for row in &rows {
        let record = row_to_output(row)?;
        // Rows arrive newest first within each stage
        latest.entry(record.stage).or_insert(record);
    }
    Ok(latest)
}

/// Latest output of one stage
pub async fn get_latest_output(
    pool: &SqlitePool,
    pipeline_id: Uuid,
    stage: Stage,
) -> Result<Option<StageOutputRecord>> {
    let row = sqlx::query(
        r#"
        SELECT id, pipeline_id, stage, output_json, created_at
        FROM stage_outputs
        WHERE pipeline_id = ? AND stage = ?
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(pipeline_id.to_string())
    .bind(i64::from(stage.number()))
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_output).transpose()
}

/// Every output of one stage, oldest first
pub async fn list_stage_outputs(
    pool: &SqlitePool,
    pipeline_id: Uuid,
    stage: Stage,
) -> Result<Vec<StageOutputRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, pipeline_id, stage, output_json, created_at
        FROM stage_outputs
        WHERE pipeline_id = ? AND stage = ?
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(pipeline_id.to_string())
    .bind(i64::from(stage.number()))
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_output).collect()
}

fn row_to_output(row: &SqliteRow) -> Result<StageOutputRecord> {
    let pipeline_id: String = row.get("pipeline_id");
    let stage: i64 = row.get("stage");
    let output_json: String = row.get("output_json");
    let created_at: String = row.get("created_at");

    let stage = u8::try_from(stage)
        .ok()
        .and_then(Stage::from_number)
        .ok_or_else(|| Error::Internal(format!("stage out of range: {}", stage)))?;

    Ok(StageOutputRecord {
        id: row.get("id"),
        pipeline_id: parse_uuid(&pipeline_id, "stage_outputs.pipeline_id")?,
        stage,
        output: serde_json::from_str(&output_json)
            .map_err(|e| Error::Internal(format!("Failed to deserialize stage output: {}", e)))?,
        created_at: parse_db_string(&created_at, "created_at")?,
    })
}
