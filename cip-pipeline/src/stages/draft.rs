//! Stage 6: draft generation

use super::{brand_examples, completed, StageContext};
use crate::error::PipelineError;
use crate::models::{ContentBrief, DraftMetadata, DraftOutput, Outline, OutlineOutput, Stage};
use crate::text::{count_words, first_paragraph, slugify, strip_code_fences};
use crate::types::{StageFailure, StageOutcome};
use tracing::{info, warn};

const MIN_WORDS: usize = 1200;
const MAX_WORDS: usize = 3500;
const MIN_H2_SECTIONS: usize = 3;

pub async fn run(
    ctx: &StageContext<'_>,
    outline: &OutlineOutput,
    brief: &ContentBrief,
) -> StageOutcome<DraftOutput> {
    completed(generate(ctx, &outline.outline, brief).await)
}

async fn generate(
    ctx: &StageContext<'_>,
    outline: &Outline,
    brief: &ContentBrief,
) -> Result<DraftOutput, StageFailure> {
    check_outline(outline)?;

    let examples = brand_examples(ctx, &brief.target_topic, ctx.settings.corpus.draft_examples).await?;
    let raw = ctx
        .collaborators
        .generator
        .generate_draft(outline, brief, &examples)
        .await?;
    let content = strip_code_fences(&raw);

    let validation_warnings = validate_draft(&content, &brief.primary_keyword);
    if !validation_warnings.is_empty() {
        warn!(
            pipeline_id = %ctx.pipeline_id,
            warnings = ?validation_warnings,
            "Draft validation warnings"
        );
    }

    let metadata = build_metadata(&content, outline, brief);
    let draft_file = ctx.artifacts.write_draft(ctx.pipeline_id, &content).await?;

    info!(
        pipeline_id = %ctx.pipeline_id,
        word_count = metadata.word_count,
        slug = %metadata.slug,
        "Draft generated"
    );

    Ok(DraftOutput {
        content,
        metadata,
        validation_warnings,
        draft_file,
    })
}

/// The outline must carry a title and at least one section to write from
fn check_outline(outline: &Outline) -> Result<(), PipelineError> {
    if outline.h1.trim().is_empty() {
        return Err(PipelineError::DataIntegrity {
            stage: Stage::Outline,
            field: "h1".to_string(),
            detail: "outline has no H1".to_string(),
        });
    }
    if outline.sections.is_empty() {
        return Err(PipelineError::DataIntegrity {
            stage: Stage::Outline,
            field: "sections".to_string(),
            detail: "outline has no sections".to_string(),
        });
    }
    Ok(())
}

/// Advisory checks on a generated draft
pub fn validate_draft(content: &str, primary_keyword: &str) -> Vec<String> {
    let mut issues = Vec::new();

    let word_count = content.split_whitespace().count();
    if word_count < MIN_WORDS {
        issues.push(format!("Content too short ({} words, minimum {})", word_count, MIN_WORDS));
    } else if word_count > MAX_WORDS {
        issues.push(format!("Content too long ({} words, maximum {})", word_count, MAX_WORDS));
    }

    if !content.trim_start().starts_with('#') {
        issues.push("Content doesn't start with H1".to_string());
    }

    let h2_count = content.lines().filter(|line| line.starts_with("## ")).count();
    if h2_count < MIN_H2_SECTIONS {
        issues.push(format!("Too few H2 sections ({}, minimum {})", h2_count, MIN_H2_SECTIONS));
    }

    let keyword = primary_keyword.trim().to_lowercase();
    if !keyword.is_empty() && !first_paragraph(content).to_lowercase().contains(&keyword) {
        issues.push("Primary keyword not in first paragraph".to_string());
    }

    issues
}

/// Title comes from the draft's first `# ` heading, falling back to the outline
pub fn build_metadata(content: &str, outline: &Outline, brief: &ContentBrief) -> DraftMetadata {
    let title = content
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("# "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| outline.h1.clone());

    DraftMetadata {
        slug: slugify(&title),
        meta_description: outline.meta_description.clone(),
        word_count: count_words(content),
        h1: title.clone(),
        title,
        primary_keyword: brief.primary_keyword.clone(),
        secondary_keywords: brief.secondary_keywords.clone(),
    }
}
