//! Stage 3: safety gate and source fingerprint

use super::StageContext;
use crate::gates::SafetyGate;
use crate::models::{ExtractionOutput, SafetyOutput};
use crate::text::chunk_words;
use crate::types::{StageFailure, StageOutcome};
use tracing::debug;

pub async fn run(
    ctx: &StageContext<'_>,
    source_url: &str,
    extraction: &ExtractionOutput,
) -> StageOutcome<SafetyOutput> {
    match evaluate(ctx, source_url, extraction).await {
        Ok(output) if !output.decision.proceed => {
            let reasons = output.decision.warnings.clone();
            StageOutcome::Blocked { output, reasons }
        }
        Ok(output) => StageOutcome::Completed(output),
        Err(failure) => StageOutcome::Failed(failure),
    }
}

async fn evaluate(
    ctx: &StageContext<'_>,
    source_url: &str,
    extraction: &ExtractionOutput,
) -> Result<SafetyOutput, StageFailure> {
    let gate = SafetyGate::new(ctx.settings.safety.clone());
    let decision = gate.evaluate(source_url, &extraction.content);

    // Fingerprint of the source for the plagiarism check in stage 7
    let chunks = chunk_words(&extraction.content, ctx.settings.safety.chunk_words);
    let embeddings = if chunks.is_empty() {
        Vec::new()
    } else {
        ctx.collaborators.embedder.embed(&chunks).await?
    };
    let fingerprint_file = ctx
        .artifacts
        .write_fingerprint(ctx.pipeline_id, &embeddings)
        .await?;

    debug!(pipeline_id = %ctx.pipeline_id, chunks = embeddings.len(), "Source fingerprint saved");

    Ok(SafetyOutput {
        decision,
        fingerprint_chunks: embeddings.len(),
        fingerprint_file,
    })
}
