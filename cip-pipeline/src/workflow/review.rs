//! Human review actions
//!
//! Reviewers move a pipeline out of the statuses the orchestrator leaves it in:
//!
//! | Action          | Allowed from                                           | Result       |
//! |-----------------|--------------------------------------------------------|--------------|
//! | approve         | completed, review_required                             | approved     |
//! | reject          | completed, review_required, blocked_qa, blocked_safety | rejected     |
//! | request_changes | completed, review_required, blocked_qa                 | regeneration |
//!
//! Every action is recorded in the audit log with the reviewer's name. A
//! decision is applied with a compare-and-set on the status, so of several
//! concurrent actions on one pipeline exactly one takes effect.

use super::orchestrator::{Orchestrator, RegenerationOutcome};
use crate::db::{self, AuditEntry};
use crate::error::{PipelineError, PipelineResult};
use crate::models::{AuditEventType, PipelineRecord, PipelineStatus};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

/// Reviewer-facing operations over an orchestrator
#[derive(Clone)]
pub struct ReviewWorkflow {
    orchestrator: Orchestrator,
}

impl ReviewWorkflow {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }

    /// Approve for publication
    pub async fn approve(
        &self,
        pipeline_id: Uuid,
        reviewer: &str,
        note: Option<&str>,
    ) -> PipelineResult<PipelineRecord> {
        let reviewer = required("reviewer", reviewer)?;
        self.decide(
            pipeline_id,
            PipelineStatus::Approved,
            AuditEventType::APPROVED,
            reviewer,
            json!({ "note": note }),
        )
        .await
    }

    /// Reject with a reason
    pub async fn reject(&self, pipeline_id: Uuid, reviewer: &str, reason: &str) -> PipelineResult<PipelineRecord> {
        let reviewer = required("reviewer", reviewer)?;
        let reason = required("reason", reason)?;
        self.decide(
            pipeline_id,
            PipelineStatus::Rejected,
            AuditEventType::REJECTED,
            reviewer,
            json!({ "reason": reason }),
        )
        .await
    }

    /// Record the feedback and regenerate stages 5-8 with it
    pub async fn request_changes(
        &self,
        pipeline_id: Uuid,
        reviewer: &str,
        feedback: &str,
    ) -> PipelineResult<RegenerationOutcome> {
        let reviewer = required("reviewer", reviewer)?;
        let feedback = required("feedback", feedback)?;

        info!(pipeline_id = %pipeline_id, reviewer, "Changes requested");
        let request = json!({ "feedback": feedback, "reviewer": reviewer });
        self.orchestrator
            .start_regeneration(
                pipeline_id,
                feedback,
                Some(AuditEntry::new(AuditEventType::CHANGES_REQUESTED, Some(reviewer), &request)),
            )
            .await
    }

    async fn decide(
        &self,
        pipeline_id: Uuid,
        target: PipelineStatus,
        event_type: &str,
        reviewer: &str,
        metadata: serde_json::Value,
    ) -> PipelineResult<PipelineRecord> {
        let mut record = self.orchestrator.get_pipeline(pipeline_id).await?;
        if !record.status.can_transition_to(target) {
            return Err(PipelineError::InvalidTransition {
                from: record.status,
                to: target,
            });
        }

        // The decision and its audit row land together, and only if no other
        // reviewer moved the pipeline since it was read
        let entry = AuditEntry::new(event_type, Some(reviewer), &metadata);
        let max_wait_ms = self.orchestrator.settings().database.max_lock_wait_ms;
        let applied = db::transition_status(
            self.orchestrator.pool(),
            pipeline_id,
            record.status,
            target,
            &[entry],
            max_wait_ms,
        )
        .await?;
        if !applied {
            let current = self.orchestrator.get_pipeline(pipeline_id).await?;
            warn!(pipeline_id = %pipeline_id, reviewer, status = %current.status, "Review decision lost to a concurrent change");
            return Err(PipelineError::InvalidTransition {
                from: current.status,
                to: target,
            });
        }

        let transition = record.transition_to(target);
        info!(
            pipeline_id = %pipeline_id,
            reviewer,
            from = %transition.old_status,
            to = %transition.new_status,
            "Review decision recorded"
        );
        Ok(record)
    }
}

/// Trimmed, non-empty value
fn required<'a>(field: &str, value: &'a str) -> PipelineResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::InputValidation(format!("{} must not be empty", field)));
    }
    Ok(trimmed)
}
