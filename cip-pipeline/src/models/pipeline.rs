//! Pipeline record and status state machine
//!
//! ```text
//! running ──▶ blocked_safety | blocked_qa | failed | review_required | completed
//! completed | review_required ──▶ approved | rejected | running (regeneration)
//! blocked_qa ──▶ running (regeneration) | rejected
//! blocked_safety ──▶ rejected
//! ```
//!
//! `blocked_safety`, `blocked_qa`, `failed`, `approved` and `rejected` are terminal
//! for automated processing; only a human action moves a pipeline out of them.

use crate::gates::RiskLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Pipeline status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// Stages executing (initial run or regeneration)
    Running,
    /// Safety gate declined to proceed
    BlockedSafety,
    /// Quality gate blocked the draft
    BlockedQa,
    /// A stage failed; operator investigation required
    Failed,
    /// Formatted, waiting for mandatory human review
    ReviewRequired,
    /// Formatted, no mandatory review flagged
    Completed,
    /// Approved for publication
    Approved,
    /// Rejected by a reviewer
    Rejected,
}

impl PipelineStatus {
    pub const ALL: [PipelineStatus; 8] = [
        PipelineStatus::Running,
        PipelineStatus::BlockedSafety,
        PipelineStatus::BlockedQa,
        PipelineStatus::Failed,
        PipelineStatus::ReviewRequired,
        PipelineStatus::Completed,
        PipelineStatus::Approved,
        PipelineStatus::Rejected,
    ];

    /// Stored string form
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::Running => "running",
            PipelineStatus::BlockedSafety => "blocked_safety",
            PipelineStatus::BlockedQa => "blocked_qa",
            PipelineStatus::Failed => "failed",
            PipelineStatus::ReviewRequired => "review_required",
            PipelineStatus::Completed => "completed",
            PipelineStatus::Approved => "approved",
            PipelineStatus::Rejected => "rejected",
        }
    }

    /// Whether the state machine permits moving from `self` to `next`
    pub fn can_transition_to(&self, next: PipelineStatus) -> bool {
        use PipelineStatus::*;
        matches!(
            (self, next),
            (Running, BlockedSafety)
                | (Running, BlockedQa)
                | (Running, Failed)
                | (Running, ReviewRequired)
                | (Running, Completed)
                | (Completed, Approved)
                | (Completed, Rejected)
                | (Completed, Running)
                | (ReviewRequired, Approved)
                | (ReviewRequired, Rejected)
                | (ReviewRequired, Running)
                | (BlockedQa, Running)
                | (BlockedQa, Rejected)
                | (BlockedSafety, Rejected)
        )
    }

    /// No further automated processing happens from this status
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            PipelineStatus::Running | PipelineStatus::ReviewRequired | PipelineStatus::Completed
        )
    }

    /// Halted by business policy; a reviewer decides what happens next
    pub fn is_blocked(&self) -> bool {
        matches!(self, PipelineStatus::BlockedSafety | PipelineStatus::BlockedQa)
    }

    /// Halted by an execution error; an operator investigates
    pub fn is_failure(&self) -> bool {
        matches!(self, PipelineStatus::Failed)
    }

    /// Whether human-feedback regeneration may start from this status
    pub fn accepts_regeneration(&self) -> bool {
        self.can_transition_to(PipelineStatus::Running)
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PipelineStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown pipeline status '{}'", s))
    }
}

/// Status change event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusTransition {
    pub pipeline_id: Uuid,
    pub old_status: PipelineStatus,
    pub new_status: PipelineStatus,
    pub transitioned_at: DateTime<Utc>,
}

/// Persisted pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRecord {
    /// Generated at run start
    pub id: Uuid,

    pub source_url: String,

    /// Number of the last successfully completed stage (0 before stage 1)
    pub current_stage: u8,

    pub status: PipelineStatus,

    /// Risk level from the safety gate
    pub safety_decision: Option<RiskLevel>,

    /// SEO score from the most recent quality gate
    pub quality_score: Option<f64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PipelineRecord {
    /// New record at stage 0 in `running`
    pub fn new(source_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            source_url: source_url.into(),
            current_stage: 0,
            status: PipelineStatus::Running,
            safety_decision: None,
            quality_score: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a status change, returning the transition for logging
    pub fn transition_to(&mut self, new_status: PipelineStatus) -> StatusTransition {
        let transition = StatusTransition {
            pipeline_id: self.id,
            old_status: self.status,
            new_status,
            transitioned_at: Utc::now(),
        };
        self.status = new_status;
        self.updated_at = transition.transitioned_at;
        transition
    }
}
