//! Stage 7: quality assurance
//!
//! Runs the plagiarism check against the stage 3 fingerprint, collects
//! fact-check claims, scores SEO and applies the quality gate. A blocked
//! report still produces a stored payload so reviewers can see why.

use super::StageContext;
use crate::gates::{check_plagiarism, score_seo, QualityGate};
use crate::models::{Claim, DraftOutput, QaOutput};
use crate::text::chunk_words;
use crate::types::{StageFailure, StageOutcome};
use tracing::{info, warn};

pub async fn run(ctx: &StageContext<'_>, draft: &DraftOutput) -> StageOutcome<QaOutput> {
    match assess(ctx, draft).await {
        Ok(output) if !output.quality_report.passed() => {
            let reasons = output.quality_report.blocking_issues.clone();
            StageOutcome::Blocked { output, reasons }
        }
        Ok(output) => StageOutcome::Completed(output),
        Err(failure) => StageOutcome::Failed(failure),
    }
}

async fn assess(ctx: &StageContext<'_>, draft: &DraftOutput) -> Result<QaOutput, StageFailure> {
    let settings = ctx.settings;

    // Plagiarism
    let fingerprint = ctx.artifacts.read_fingerprint(ctx.pipeline_id).await?;
    let chunks = chunk_words(&draft.content, settings.quality.chunk_words);
    let embeddings = if chunks.is_empty() || fingerprint.is_none() {
        Vec::new()
    } else {
        ctx.collaborators.embedder.embed(&chunks).await?
    };
    let plagiarism = check_plagiarism(
        &chunks,
        &embeddings,
        fingerprint.as_deref(),
        settings.quality.plagiarism_threshold,
    );

    // Claims are advisory; a fact-checker outage does not stop publication review
    let fact_check: Vec<Claim> = match ctx.collaborators.fact_checker.identify_claims(&draft.content).await {
        Ok(claims) => claims,
        Err(e) => {
            warn!(pipeline_id = %ctx.pipeline_id, error = %e, "Fact check unavailable, continuing without claims");
            Vec::new()
        }
    };

    let seo_analysis = score_seo(&draft.content, &draft.metadata, &settings.seo, &settings.brand.link_topics);
    let quality_report =
        QualityGate::new(settings.seo.clone()).evaluate(&draft.metadata, &plagiarism, &seo_analysis, &fact_check);

    info!(
        pipeline_id = %ctx.pipeline_id,
        status = %quality_report.overall_status,
        seo_score = seo_analysis.total_score,
        max_similarity = plagiarism.max_similarity,
        claims = fact_check.len(),
        "Quality assessment complete"
    );

    Ok(QaOutput {
        quality_report,
        plagiarism_check: plagiarism,
        fact_check,
        seo_analysis,
    })
}
