//! Pipeline record operations

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use cip_common::time::{parse_db_string, to_db_string};
use cip_common::{Error, Result};

use super::audit::{metadata_json, AuditEntry, INSERT_EVENT};
use super::parse_uuid;
use crate::gates::RiskLevel;
use crate::models::{PipelineRecord, PipelineStatus};
use crate::utils::retry_on_lock;

const SELECT_COLUMNS: &str = "SELECT id, source_url, current_stage, status, safety_decision, \
                              quality_score, created_at, updated_at FROM pipelines";

/// Insert a new pipeline record
pub async fn create_pipeline(pool: &SqlitePool, record: &PipelineRecord, max_wait_ms: u64) -> Result<()> {
    // Prepare all data before acquiring a connection
    let id = record.id.to_string();
    let status = record.status.as_str();
    let safety = record.safety_decision.map(|r| r.as_str());
    let created_at = to_db_string(&record.created_at);
    let updated_at = to_db_string(&record.updated_at);

    retry_on_lock("create_pipeline", max_wait_ms, || async {
        sqlx::query(
            r#"
            INSERT INTO pipelines (
                id, source_url, current_stage, status, safety_decision,
                quality_score, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&record.source_url)
        .bind(i64::from(record.current_stage))
        .bind(status)
        .bind(safety)
        .bind(record.quality_score)
        .bind(&created_at)
        .bind(&updated_at)
        .execute(pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    })
    .await
}

/// Load a pipeline record
pub async fn get_pipeline(pool: &SqlitePool, id: Uuid) -> Result<Option<PipelineRecord>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_record).transpose()
}

/// Most recently updated pipelines, optionally filtered by status
pub async fn list_pipelines(
    pool: &SqlitePool,
    status: Option<PipelineStatus>,
    limit: u32,
) -> Result<Vec<PipelineRecord>> {
    let rows = match status {
        Some(status) => {
            sqlx::query(&format!(
                "{} WHERE status = ? ORDER BY updated_at DESC LIMIT ?",
                SELECT_COLUMNS
            ))
            .bind(status.as_str())
            .bind(i64::from(limit))
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(&format!("{} ORDER BY updated_at DESC LIMIT ?", SELECT_COLUMNS))
                .bind(i64::from(limit))
                .fetch_all(pool)
                .await?
        }
    };

    rows.iter().map(row_to_record).collect()
}

/// Advance `current_stage`; never moves it backwards
pub async fn update_stage(pool: &SqlitePool, id: Uuid, stage: u8, max_wait_ms: u64) -> Result<()> {
    let id_str = id.to_string();
    let now = to_db_string(&cip_common::time::now());

    retry_on_lock("update_stage", max_wait_ms, || async {
        let result = sqlx::query(
            "UPDATE pipelines SET current_stage = MAX(current_stage, ?), updated_at = ? WHERE id = ?",
        )
        .bind(i64::from(stage))
        .bind(&now)
        .bind(&id_str)
        .execute(pool)
        .await
        .map_err(Error::Database)?;

        ensure_updated(result.rows_affected(), id)
    })
    .await
}

/// Set pipeline status
pub async fn set_status(pool: &SqlitePool, id: Uuid, status: PipelineStatus, max_wait_ms: u64) -> Result<()> {
    let id_str = id.to_string();
    let now = to_db_string(&cip_common::time::now());

    retry_on_lock("set_status", max_wait_ms, || async {
        let result = sqlx::query("UPDATE pipelines SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(&now)
            .bind(&id_str)
            .execute(pool)
            .await
            .map_err(Error::Database)?;

        ensure_updated(result.rows_affected(), id)
    })
    .await
}

/// Move the pipeline from `from` to `to` only if it is still in `from`.
///
/// `events` are appended in the same transaction, and only when the status
/// changed. Returns `false` when another writer moved the pipeline first.
pub async fn transition_status(
    pool: &SqlitePool,
    id: Uuid,
    from: PipelineStatus,
    to: PipelineStatus,
    events: &[AuditEntry<'_>],
    max_wait_ms: u64,
) -> Result<bool> {
    let id_str = id.to_string();
    let now = to_db_string(&cip_common::time::now());
    let events: Vec<(&AuditEntry<'_>, Option<String>)> = events
        .iter()
        .map(|entry| Ok((entry, metadata_json(entry.metadata)?)))
        .collect::<Result<_>>()?;

    retry_on_lock("transition_status", max_wait_ms, || async {
        let mut tx = pool.begin().await?;

        let result = sqlx::query("UPDATE pipelines SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
            .bind(to.as_str())
            .bind(&now)
            .bind(&id_str)
            .bind(from.as_str())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        for (entry, metadata) in &events {
            sqlx::query(INSERT_EVENT)
                .bind(&id_str)
                .bind(entry.event_type)
                .bind(entry.reviewer)
                .bind(metadata)
                .bind(&now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(true)
    })
    .await
}

/// Record the safety gate's risk level
pub async fn set_safety_decision(pool: &SqlitePool, id: Uuid, risk: RiskLevel, max_wait_ms: u64) -> Result<()> {
    let id_str = id.to_string();
    let now = to_db_string(&cip_common::time::now());

    retry_on_lock("set_safety_decision", max_wait_ms, || async {
        let result = sqlx::query("UPDATE pipelines SET safety_decision = ?, updated_at = ? WHERE id = ?")
            .bind(risk.as_str())
            .bind(&now)
            .bind(&id_str)
            .execute(pool)
            .await
            .map_err(Error::Database)?;

        ensure_updated(result.rows_affected(), id)
    })
    .await
}

/// Record the latest quality score
pub async fn set_quality_score(pool: &SqlitePool, id: Uuid, score: f64, max_wait_ms: u64) -> Result<()> {
    let id_str = id.to_string();
    let now = to_db_string(&cip_common::time::now());

    retry_on_lock("set_quality_score", max_wait_ms, || async {
        let result = sqlx::query("UPDATE pipelines SET quality_score = ?, updated_at = ? WHERE id = ?")
            .bind(score)
            .bind(&now)
            .bind(&id_str)
            .execute(pool)
            .await
            .map_err(Error::Database)?;

        ensure_updated(result.rows_affected(), id)
    })
    .await
}

fn ensure_updated(rows_affected: u64, id: Uuid) -> Result<()> {
    if rows_affected == 0 {
        return Err(Error::NotFound(format!("pipeline {}", id)));
    }
    Ok(())
}

fn row_to_record(row: &SqliteRow) -> Result<PipelineRecord> {
    let id: String = row.get("id");
    let current_stage: i64 = row.get("current_stage");
    let status: String = row.get("status");
    let safety: Option<String> = row.get("safety_decision");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(PipelineRecord {
        id: parse_uuid(&id, "pipelines.id")?,
        source_url: row.get("source_url"),
        current_stage: u8::try_from(current_stage)
            .map_err(|_| Error::Internal(format!("current_stage out of range: {}", current_stage)))?,
        status: status.parse::<PipelineStatus>().map_err(Error::Internal)?,
        safety_decision: safety
            .map(|s| s.parse::<RiskLevel>())
            .transpose()
            .map_err(Error::Internal)?,
        quality_score: row.get("quality_score"),
        created_at: parse_db_string(&created_at, "created_at")?,
        updated_at: parse_db_string(&updated_at, "updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cip_common::db::init_memory_database;

    #[tokio::test]
    async fn test_create_and_get_round_trip() {
        let pool = init_memory_database().await.unwrap();
        let record = PipelineRecord::new("https://blog.example.com/post");
        create_pipeline(&pool, &record, 1000).await.unwrap();

        let loaded = get_pipeline(&pool, record.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.status, PipelineStatus::Running);
        assert_eq!(loaded.current_stage, 0);
        assert_eq!(loaded.created_at, record.created_at);
    }

    #[tokio::test]
    async fn test_current_stage_never_decreases() {
        let pool = init_memory_database().await.unwrap();
        let record = PipelineRecord::new("https://blog.example.com/post");
        create_pipeline(&pool, &record, 1000).await.unwrap();

        update_stage(&pool, record.id, 7, 1000).await.unwrap();
        update_stage(&pool, record.id, 5, 1000).await.unwrap();

        let loaded = get_pipeline(&pool, record.id).await.unwrap().unwrap();
        assert_eq!(loaded.current_stage, 7);
    }

    #[tokio::test]
    async fn test_updates_on_unknown_pipeline_are_not_found() {
        let pool = init_memory_database().await.unwrap();
        let result = set_status(&pool, Uuid::new_v4(), PipelineStatus::Failed, 1000).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_transition_requires_expected_status() {
        let pool = init_memory_database().await.unwrap();
        let record = PipelineRecord::new("https://blog.example.com/post");
        create_pipeline(&pool, &record, 1000).await.unwrap();
        set_status(&pool, record.id, PipelineStatus::ReviewRequired, 1000).await.unwrap();

        let note = serde_json::json!({ "note": "ok" });
        let approved = [AuditEntry::new("approved", Some("dana"), &note)];
        assert!(transition_status(
            &pool,
            record.id,
            PipelineStatus::ReviewRequired,
            PipelineStatus::Approved,
            &approved,
            1000
        )
        .await
        .unwrap());

        // Stale expectation: no change, no audit row
        let reason = serde_json::json!({ "reason": "late" });
        let rejected = [AuditEntry::new("rejected", Some("erin"), &reason)];
        assert!(!transition_status(
            &pool,
            record.id,
            PipelineStatus::ReviewRequired,
            PipelineStatus::Rejected,
            &rejected,
            1000
        )
        .await
        .unwrap());

        let loaded = get_pipeline(&pool, record.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, PipelineStatus::Approved);
        let events = crate::db::get_audit_log(&pool, record.id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "approved");
        assert_eq!(events[0].reviewer.as_deref(), Some("dana"));
    }

    #[tokio::test]
    async fn test_gate_results_persisted() {
        let pool = init_memory_database().await.unwrap();
        let record = PipelineRecord::new("https://blog.example.com/post");
        create_pipeline(&pool, &record, 1000).await.unwrap();

        set_safety_decision(&pool, record.id, RiskLevel::Yellow, 1000).await.unwrap();
        set_quality_score(&pool, record.id, 82.5, 1000).await.unwrap();

        let loaded = get_pipeline(&pool, record.id).await.unwrap().unwrap();
        assert_eq!(loaded.safety_decision, Some(RiskLevel::Yellow));
        assert_eq!(loaded.quality_score, Some(82.5));
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let pool = init_memory_database().await.unwrap();
        for _ in 0..3 {
            create_pipeline(&pool, &PipelineRecord::new("https://a.example.com/x"), 1000)
                .await
                .unwrap();
        }
        let failed = PipelineRecord::new("https://b.example.com/y");
        create_pipeline(&pool, &failed, 1000).await.unwrap();
        set_status(&pool, failed.id, PipelineStatus::Failed, 1000).await.unwrap();

        let all = list_pipelines(&pool, None, 20).await.unwrap();
        assert_eq!(all.len(), 4);
        // Most recently updated first
        assert_eq!(all[0].id, failed.id);

        let only_failed = list_pipelines(&pool, Some(PipelineStatus::Failed), 20).await.unwrap();
        assert_eq!(only_failed.len(), 1);
        assert_eq!(list_pipelines(&pool, None, 2).await.unwrap().len(), 2);
    }
}
