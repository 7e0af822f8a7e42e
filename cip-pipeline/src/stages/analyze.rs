//! Stage 2: content analysis and brief

use super::{completed, StageContext};
use crate::error::PipelineError;
use crate::models::{AnalysisOutput, ExtractionOutput, Stage};
use crate::types::{StageFailure, StageOutcome};
use tracing::info;

pub async fn run(ctx: &StageContext<'_>, extraction: &ExtractionOutput) -> StageOutcome<AnalysisOutput> {
    completed(analyze(ctx, extraction).await)
}

async fn analyze(ctx: &StageContext<'_>, extraction: &ExtractionOutput) -> Result<AnalysisOutput, StageFailure> {
    if extraction.content.trim().is_empty() {
        return Err(PipelineError::DataIntegrity {
            stage: Stage::Extraction,
            field: "content".to_string(),
            detail: "extracted text is empty".to_string(),
        }
        .into());
    }

    let result = ctx.collaborators.analyzer.analyze(&extraction.content).await?;
    let output = AnalysisOutput::from(result);

    info!(
        pipeline_id = %ctx.pipeline_id,
        topic = %output.content_brief.target_topic,
        primary_keyword = %output.content_brief.primary_keyword,
        "Content brief ready"
    );
    Ok(output)
}
