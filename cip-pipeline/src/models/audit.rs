//! Audit events
//!
//! Append-only history of automated and human actions against a pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Persisted audit event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: i64,
    pub pipeline_id: Uuid,
    /// Event tag, e.g. `stage_3_completed`, `approved`
    pub event_type: String,
    pub reviewer: Option<String>,
    pub metadata: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

/// Event tags not derived from a stage number
pub struct AuditEventType;

impl AuditEventType {
    pub const PIPELINE_STARTED: &'static str = "pipeline_started";
    pub const PIPELINE_COMPLETED: &'static str = "pipeline_completed";
    pub const PIPELINE_FAILED: &'static str = "pipeline_failed";
    pub const PIPELINE_CANCELLED: &'static str = "pipeline_cancelled";
    pub const BLOCKED_SAFETY: &'static str = "blocked_safety";
    pub const BLOCKED_QA: &'static str = "blocked_qa";
    pub const REGENERATION_STARTED: &'static str = "regeneration_started";
    pub const REGENERATION_COMPLETED: &'static str = "regeneration_completed";
    pub const REGENERATION_FAILED: &'static str = "regeneration_failed";
    pub const APPROVED: &'static str = "approved";
    pub const REJECTED: &'static str = "rejected";
    pub const CHANGES_REQUESTED: &'static str = "changes_requested";
}
