//! Stage 1: source extraction

use super::{completed, StageContext};
use crate::models::ExtractionOutput;
use crate::text::{count_words, truncate_chars};
use crate::types::{CollaboratorError, StageFailure, StageOutcome};
use tracing::info;

/// Characters of source text kept inline in the payload
const PREVIEW_CHARS: usize = 500;

pub async fn run(ctx: &StageContext<'_>, source_url: &str) -> StageOutcome<ExtractionOutput> {
    completed(extract(ctx, source_url).await)
}

async fn extract(ctx: &StageContext<'_>, source_url: &str) -> Result<ExtractionOutput, StageFailure> {
    let extracted = ctx.collaborators.extractor.extract(source_url).await?;

    let word_count = count_words(&extracted.content);
    let minimum = ctx.settings.extraction.min_words;
    if word_count < minimum {
        return Err(CollaboratorError::InsufficientContent { word_count, minimum }.into());
    }

    let content_file = ctx
        .artifacts
        .write_extraction(ctx.pipeline_id, &extracted.content)
        .await?;

    info!(
        pipeline_id = %ctx.pipeline_id,
        method = %extracted.extraction_method,
        word_count,
        "Source extracted"
    );

    Ok(ExtractionOutput {
        source_url: source_url.to_string(),
        extraction_method: extracted.extraction_method,
        word_count,
        metadata: extracted.metadata,
        extracted_at: cip_common::time::now(),
        content_preview: truncate_chars(&extracted.content, PREVIEW_CHARS),
        content_file,
        content: extracted.content,
    })
}
