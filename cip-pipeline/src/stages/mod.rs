//! Stage runners
//!
//! Each stage is an async function taking the shared [`StageContext`] plus the
//! typed outputs of the stages it depends on, and returning a
//! [`StageOutcome`](crate::types::StageOutcome). Stages never touch the
//! pipeline record; persistence and status changes belong to the orchestrator.
//!
//! | # | Stage             | Depends on | Can block |
//! |---|-------------------|------------|-----------|
//! | 1 | extract           | source URL | no        |
//! | 2 | analyze           | 1          | no        |
//! | 3 | safety            | 1          | yes       |
//! | 4 | rag_setup         |            | no        |
//! | 5 | outline           | 2          | no        |
//! | 6 | draft             | 2, 5       | no        |
//! | 7 | qa                | 3, 6       | yes       |
//! | 8 | format            | 6, 7       | no        |

pub mod analyze;
pub mod draft;
pub mod extract;
pub mod format;
pub mod outline;
pub mod qa;
pub mod rag_setup;
pub mod safety;

use crate::artifacts::ArtifactStore;
use crate::config::PipelineSettings;
use crate::models::BrandExample;
use crate::types::{Collaborators, StageFailure, StageOutcome};
use tracing::warn;
use uuid::Uuid;

/// Everything a stage may use besides upstream outputs
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub pipeline_id: Uuid,
    pub settings: &'a PipelineSettings,
    pub collaborators: &'a Collaborators,
    pub artifacts: &'a ArtifactStore,
}

/// Map a fallible stage body onto a non-blocking outcome
pub(crate) fn completed<T>(result: Result<T, StageFailure>) -> StageOutcome<T> {
    match result {
        Ok(output) => StageOutcome::Completed(output),
        Err(failure) => StageOutcome::Failed(failure),
    }
}

/// Brand examples for `topic`, falling back to the built-in default
pub(crate) async fn brand_examples(
    ctx: &StageContext<'_>,
    topic: &str,
    limit: usize,
) -> Result<Vec<BrandExample>, StageFailure> {
    let examples = ctx
        .collaborators
        .corpus
        .retrieve_brand_examples(topic, limit)
        .await?;

    if examples.is_empty() {
        warn!(pipeline_id = %ctx.pipeline_id, topic, "No brand examples found, using default voice");
        return Ok(vec![BrandExample::default_example()]);
    }
    Ok(examples)
}
