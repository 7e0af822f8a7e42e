//! Pipeline workflow
//!
//! - [`Orchestrator`]: runs the eight stages, persists outputs and owns status
//!   transitions for automated processing
//! - [`ReviewWorkflow`]: human approve / reject / request-changes actions
//! - [`PipelineEvent`]: progress notifications for front ends

pub mod orchestrator;
pub mod review;

pub use orchestrator::{Orchestrator, RegenerationOutcome};
pub use review::ReviewWorkflow;

use crate::models::PipelineStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Progress events sent over the optional orchestrator channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// Record created, stage 1 about to run
    PipelineStarted {
        pipeline_id: Uuid,
        source_url: String,
        /// Unix timestamp (seconds since epoch)
        timestamp: i64,
    },

    StageStarted {
        pipeline_id: Uuid,
        stage: u8,
        name: String,
    },

    /// Stage output persisted
    StageCompleted {
        pipeline_id: Uuid,
        stage: u8,
        name: String,
    },

    StageFailed {
        pipeline_id: Uuid,
        stage: u8,
        message: String,
    },

    /// A gate stopped the pipeline
    Blocked {
        pipeline_id: Uuid,
        stage: u8,
        status: PipelineStatus,
        reasons: Vec<String>,
    },

    /// Cancellation observed before `stage`
    Cancelled { pipeline_id: Uuid, stage: u8 },

    RegenerationStarted { pipeline_id: Uuid, feedback: String },

    /// Processing ended in a non-running status
    PipelineFinished {
        pipeline_id: Uuid,
        status: PipelineStatus,
        quality_score: Option<f64>,
        timestamp: i64,
    },
}
