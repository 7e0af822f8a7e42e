//! Stage 4: brand corpus readiness

use super::{completed, StageContext};
use crate::models::RagSetupOutput;
use crate::types::{StageFailure, StageOutcome};
use tracing::info;

pub async fn run(ctx: &StageContext<'_>) -> StageOutcome<RagSetupOutput> {
    completed(setup(ctx).await)
}

async fn setup(ctx: &StageContext<'_>) -> Result<RagSetupOutput, StageFailure> {
    let status = ctx.collaborators.corpus.ensure_populated().await?;

    info!(
        pipeline_id = %ctx.pipeline_id,
        corpus_size = status.corpus_size,
        populated = status.populated,
        "Brand corpus ready"
    );

    Ok(RagSetupOutput {
        corpus_size: status.corpus_size,
        populated: status.populated,
    })
}
