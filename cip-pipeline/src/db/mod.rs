//! Pipeline persistence
//!
//! Thin query layer over the shared SQLite pool. No business rules live here:
//! the orchestrator decides what to write and when. Writes go through
//! `retry_on_lock` so concurrent pipelines survive lock contention.

pub mod audit;
pub mod corpus;
pub mod pipelines;
pub mod stage_outputs;

pub use audit::{get_audit_log, log_event, AuditEntry};
pub use pipelines::{
    create_pipeline, get_pipeline, list_pipelines, set_quality_score, set_safety_decision,
    set_status, transition_status, update_stage,
};
pub use stage_outputs::{get_latest_output, get_latest_outputs, list_stage_outputs, save_stage_output};

use cip_common::Error;
use uuid::Uuid;

/// Parse a stored UUID, naming the column in the error
pub(crate) fn parse_uuid(value: &str, column: &str) -> cip_common::Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}
