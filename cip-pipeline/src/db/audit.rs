//! Audit log operations

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use cip_common::time::{now, parse_db_string, to_db_string};
use cip_common::{Error, Result};

use super::parse_uuid;
use crate::models::AuditEvent;
use crate::utils::retry_on_lock;

/// Audit row written in the same transaction as a status change
#[derive(Debug, Clone, Copy)]
pub struct AuditEntry<'a> {
    pub event_type: &'a str,
    pub reviewer: Option<&'a str>,
    pub metadata: Option<&'a serde_json::Value>,
}

impl<'a> AuditEntry<'a> {
    pub fn new(event_type: &'a str, reviewer: Option<&'a str>, metadata: &'a serde_json::Value) -> Self {
        Self {
            event_type,
            reviewer,
            metadata: Some(metadata),
        }
    }
}

pub(crate) fn metadata_json(metadata: Option<&serde_json::Value>) -> Result<Option<String>> {
    metadata
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to serialize audit metadata: {}", e)))
}

pub(crate) const INSERT_EVENT: &str =
    "INSERT INTO audit_log (pipeline_id, event_type, reviewer, metadata, timestamp) VALUES (?, ?, ?, ?, ?)";

/// Append an audit event
pub async fn log_event(
    pool: &SqlitePool,
    pipeline_id: Uuid,
    event_type: &str,
    reviewer: Option<&str>,
    metadata: Option<&serde_json::Value>,
    max_wait_ms: u64,
) -> Result<()> {
    let pipeline_id = pipeline_id.to_string();
    let metadata = metadata_json(metadata)?;
    let timestamp = to_db_string(&now());

    retry_on_lock("log_event", max_wait_ms, || async {
        sqlx::query(INSERT_EVENT)
            .bind(&pipeline_id)
            .bind(event_type)
            .bind(reviewer)
            .bind(&metadata)
            .bind(&timestamp)
            .execute(pool)
            .await
            .map_err(Error::Database)?;

        Ok(())
    })
    .await
}

/// Audit history of a pipeline in timestamp order
pub async fn get_audit_log(pool: &SqlitePool, pipeline_id: Uuid) -> Result<Vec<AuditEvent>> {
    let rows = sqlx::query(
        r#"
        SELECT id, pipeline_id, event_type, reviewer, metadata, timestamp
        FROM audit_log
        WHERE pipeline_id = ?
        ORDER BY timestamp ASC, id ASC
        "#,
    )
    .bind(pipeline_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let pipeline_id: String = row.get("pipeline_id");
            let metadata: Option<String> = row.get("metadata");
            let timestamp: String = row.get("timestamp");

            Ok(AuditEvent {
                id: row.get("id"),
                pipeline_id: parse_uuid(&pipeline_id, "audit_log.pipeline_id")?,
                event_type: row.get("event_type"),
                reviewer: row.get("reviewer"),
                metadata: metadata
                    .map(|m| serde_json::from_str(&m))
                    .transpose()
                    .map_err(|e| Error::Internal(format!("Failed to deserialize audit metadata: {}", e)))?,
                timestamp: parse_db_string(&timestamp, "timestamp")?,
            })
        })
        .collect()
}
