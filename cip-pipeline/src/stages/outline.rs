//! Stage 5: outline generation

use super::{brand_examples, completed, StageContext};
use crate::models::{ContentBrief, Outline, OutlineOutput};
use crate::types::{StageFailure, StageOutcome};
use tracing::{info, warn};

const MIN_SECTIONS: usize = 3;
const MAX_SECTIONS: usize = 7;
const TARGET_WORDS_MIN: u32 = 1500;
const TARGET_WORDS_MAX: u32 = 2500;

pub async fn run(ctx: &StageContext<'_>, brief: &ContentBrief) -> StageOutcome<OutlineOutput> {
    completed(generate(ctx, brief).await)
}

async fn generate(ctx: &StageContext<'_>, brief: &ContentBrief) -> Result<OutlineOutput, StageFailure> {
    let examples = brand_examples(ctx, &brief.target_topic, ctx.settings.corpus.outline_examples).await?;
    let outline = ctx
        .collaborators
        .generator
        .generate_outline(brief, &examples)
        .await?;

    let validation_warnings = validate_outline(&outline, &brief.primary_keyword);
    if !validation_warnings.is_empty() {
        warn!(
            pipeline_id = %ctx.pipeline_id,
            warnings = ?validation_warnings,
            "Outline validation warnings"
        );
    }
    info!(pipeline_id = %ctx.pipeline_id, sections = outline.sections.len(), "Outline generated");

    Ok(OutlineOutput {
        outline,
        brand_examples_used: examples.len(),
        validation_warnings,
    })
}

/// Advisory checks on a generated outline
pub fn validate_outline(outline: &Outline, primary_keyword: &str) -> Vec<String> {
    let mut issues = Vec::new();

    if outline.h1.trim().is_empty() {
        issues.push("Missing H1 title".to_string());
    }
    if outline.meta_description.trim().is_empty() {
        issues.push("Missing meta description".to_string());
    }

    let keyword = primary_keyword.trim();
    if !keyword.is_empty() && !outline.h1.to_lowercase().contains(&keyword.to_lowercase()) {
        issues.push(format!("Primary keyword '{}' not in H1", keyword));
    }

    let sections = outline.sections.len();
    if sections < MIN_SECTIONS {
        issues.push(format!("Too few sections ({}, minimum {})", sections, MIN_SECTIONS));
    } else if sections > MAX_SECTIONS {
        issues.push(format!("Too many sections ({}, maximum {})", sections, MAX_SECTIONS));
    }

    let target = outline.target_word_count;
    if !(TARGET_WORDS_MIN..=TARGET_WORDS_MAX).contains(&target) {
        issues.push(format!(
            "Target word count out of range ({}, ideal {}-{})",
            target, TARGET_WORDS_MIN, TARGET_WORDS_MAX
        ));
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OutlineSection;

    fn outline(sections: usize) -> Outline {
        Outline {
            h1: "DMARC Policy Rollout Guide".to_string(),
            meta_description: "How to move to p=reject".to_string(),
            sections: (0..sections)
                .map(|i| OutlineSection {
                    h2: format!("Section {}", i),
                    ..Default::default()
                })
                .collect(),
            target_word_count: 2000,
        }
    }

    #[test]
    fn test_valid_outline_has_no_warnings() {
        assert!(validate_outline(&outline(5), "dmarc policy").is_empty());
    }

    #[test]
    fn test_section_count_and_keyword_warnings() {
        let warnings = validate_outline(&outline(2), "bimi");
        assert_eq!(
            warnings,
            vec!["Primary keyword 'bimi' not in H1", "Too few sections (2, minimum 3)"]
        );
        assert_eq!(
            validate_outline(&outline(8), "dmarc"),
            vec!["Too many sections (8, maximum 7)"]
        );
    }

    #[test]
    fn test_empty_outline_reports_everything() {
        let warnings = validate_outline(&Outline::default(), "");
        assert!(warnings.contains(&"Missing H1 title".to_string()));
        assert!(warnings.contains(&"Missing meta description".to_string()));
        assert!(warnings.iter().any(|w| w.starts_with("Target word count out of range (0")));
    }
}
