//! Error types for cip-pipeline
//!
//! Gate blocks are not errors: a safety or quality block is a normal terminal
//! outcome reported through `PipelineStatus`. Everything here aborts the caller.

use crate::models::{PipelineStatus, Stage};
use thiserror::Error;
use uuid::Uuid;

/// Result type for orchestrator and review operations
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Pipeline error taxonomy
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed input rejected before anything is persisted
    #[error("Invalid input: {0}")]
    InputValidation(String),

    /// A stage reported failure; recorded as a failed stage output
    #[error("{stage} failed for pipeline {pipeline_id}: {message}")]
    StageExecution {
        pipeline_id: Uuid,
        stage: Stage,
        message: String,
    },

    /// An upstream stage produced a payload a later stage cannot use
    #[error("Data integrity error: `{field}` missing or malformed in output of {stage}: {detail}")]
    DataIntegrity {
        stage: Stage,
        field: String,
        detail: String,
    },

    /// Requested status change is not allowed by the state machine
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: PipelineStatus,
        to: PipelineStatus,
    },

    /// Pipeline or stage output not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Run cancelled at a stage boundary
    #[error("Pipeline {pipeline_id} cancelled before {stage}")]
    Cancelled { pipeline_id: Uuid, stage: Stage },

    /// Invalid pipeline settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage failure
    #[error(transparent)]
    Persistence(#[from] cip_common::Error),
}

impl PipelineError {
    /// Build a data integrity error from a serde decode failure
    pub fn from_decode(stage: Stage, err: &serde_json::Error) -> Self {
        let detail = err.to_string();
        let field = missing_field_name(&detail).unwrap_or_else(|| "payload".to_string());
        PipelineError::DataIntegrity { stage, field, detail }
    }

    /// Stage named by the error, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::StageExecution { stage, .. }
            | PipelineError::DataIntegrity { stage, .. }
            | PipelineError::Cancelled { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        PipelineError::Persistence(cip_common::Error::Database(err))
    }
}

/// Extract `name` from serde's "missing field `name`" message
fn missing_field_name(message: &str) -> Option<String> {
    let rest = message.strip_prefix("missing field `")?;
    let end = rest.find('`')?;
    Some(rest[..end].to_string())
}
