//! LLM-backed analyzer, generator and fact checker

use super::llm_client::LlmClient;
use crate::models::{
    BrandExample, Claim, ContentAnalysis, ContentBrief, GapAnalysis, KeywordSet, Outline,
};
use crate::text::{strip_code_fences, truncate_chars};
use crate::types::{
    AnalysisResult, CollaboratorResult, ContentAnalyzer, ContentGenerator, FactChecker,
};
use serde::Deserialize;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{info, warn};

/// Source text sent to the model is cut to this many characters
const MAX_PROMPT_CHARS: usize = 12_000;
const EXAMPLE_PREVIEW_CHARS: usize = 500;

const ANALYSIS_SYSTEM: &str = "You are a content strategist analysing a competitor article. \
Respond with a single JSON object and nothing else.";

const KEYWORD_SYSTEM: &str = "You are an SEO specialist extracting search keywords from an article. \
Respond with a single JSON object and nothing else.";

const OUTLINE_SYSTEM: &str = "You are a senior editor planning an original, search-optimised blog article. \
Respond with a single JSON object and nothing else.";

const DRAFT_SYSTEM: &str = "You are an expert writer producing a complete blog article in Markdown. \
Start with a single H1, use H2 sections and H3 subsections, and write original prose in the brand voice shown.";

const FACT_CHECK_SYSTEM: &str = "You are a fact checker. Identify factual claims (statistics, dates, \
named studies, technical assertions) that an editor should verify. Respond with JSON only.";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ClaimList {
    claims: Vec<Claim>,
}

// ============================================================================
// Analyzer
// ============================================================================

/// Topic, keyword and gap analysis in three model calls
pub struct LlmAnalyzer {
    client: Arc<LlmClient>,
    brand_name: String,
}

impl LlmAnalyzer {
    pub fn new(client: Arc<LlmClient>, brand_name: impl Into<String>) -> Self {
        Self {
            client,
            brand_name: brand_name.into(),
        }
    }

    async fn extract_keywords(&self, source: &str) -> KeywordSet {
        let prompt = format!(
            "Extract keywords from the article below.\n\
             Output JSON: {{\"primary_keywords\": [...], \"secondary_keywords\": [...], \"long_tail_keywords\": [...]}}\n\
             List the most important primary keyword first.\n\nARTICLE:\n{}",
            source
        );
        match self.client.complete_json::<KeywordSet>(KEYWORD_SYSTEM, &prompt, 0.5).await {
            Ok(keywords) => keywords,
            Err(e) => {
                warn!(error = %e, "Keyword extraction failed, continuing without keywords");
                KeywordSet::default()
            }
        }
    }

    async fn analyze_gaps(&self, analysis: &ContentAnalysis) -> GapAnalysis {
        let prompt = format!(
            "Identify 3-5 gaps or angles {brand} can cover that this competitor article missed.\n\
             Main topic: {}\nStructure: {}\nKey points: {}\nMissing elements: {}\n\
             Output JSON: {{\"gaps\": [...], \"unique_angles\": [...], \"value_propositions\": [...]}}",
            analysis.main_topic,
            analysis.content_structure.join(", "),
            analysis.key_points.join(", "),
            analysis.missing_elements.join(", "),
            brand = self.brand_name,
        );
        match self.client.complete_json::<GapAnalysis>(ANALYSIS_SYSTEM, &prompt, 0.7).await {
            Ok(gaps) => gaps,
            Err(e) => {
                warn!(error = %e, "Gap analysis failed, continuing without gaps");
                GapAnalysis::default()
            }
        }
    }
}

#[async_trait::async_trait]
impl ContentAnalyzer for LlmAnalyzer {
    async fn analyze(&self, content: &str) -> CollaboratorResult<AnalysisResult> {
        let source = truncate_chars(content, MAX_PROMPT_CHARS);
        let prompt = format!(
            "Analyse the article below.\n\
             Output JSON: {{\"main_topic\": \"\", \"target_audience\": \"\", \
             \"technical_level\": \"beginner|intermediate|advanced\", \"content_structure\": [...], \
             \"key_points\": [...], \"missing_elements\": [...]}}\n\nARTICLE:\n{}",
            source
        );

        // The topic drives everything downstream, so this call must succeed
        let analysis: ContentAnalysis = self.client.complete_json(ANALYSIS_SYSTEM, &prompt, 0.7).await?;
        let keywords = self.extract_keywords(&source).await;
        let gap_analysis = self.analyze_gaps(&analysis).await;

        info!(
            topic = %analysis.main_topic,
            primary_keywords = keywords.primary_keywords.len(),
            gaps = gap_analysis.gaps.len(),
            "Content analysed"
        );

        Ok(AnalysisResult {
            content_brief: ContentBrief::compose(&analysis, &keywords, &gap_analysis),
            analysis,
            keywords,
            gap_analysis,
        })
    }
}

// ============================================================================
// Generator
// ============================================================================

/// Outline and draft writer
pub struct LlmGenerator {
    client: Arc<LlmClient>,
}

impl LlmGenerator {
    pub fn new(client: Arc<LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ContentGenerator for LlmGenerator {
    async fn generate_outline(&self, brief: &ContentBrief, examples: &[BrandExample]) -> CollaboratorResult<Outline> {
        let system = format!("{}\n\nBRAND VOICE EXAMPLES:\n{}", OUTLINE_SYSTEM, format_examples(examples));
        let prompt = format!(
            "Plan an article on \"{}\".\n{}\n\
             Output JSON: {{\"h1\": \"\", \"meta_description\": \"150-160 characters\", \
             \"sections\": [{{\"h2\": \"\", \"h3s\": [...], \"key_points\": [...]}}], \
             \"target_word_count\": 2000}}\n\
             Use 4-6 sections and include the primary keyword in the H1.",
            brief.target_topic,
            format_brief(brief)
        );
        self.client.complete_json(&system, &prompt, self.client.default_temperature()).await
    }

    async fn generate_draft(
        &self,
        outline: &Outline,
        brief: &ContentBrief,
        examples: &[BrandExample],
    ) -> CollaboratorResult<String> {
        let system = format!("{}\n\nBRAND VOICE EXAMPLES:\n{}", DRAFT_SYSTEM, format_examples(examples));
        let prompt = format!(
            "Write the full article following this outline.\n\nOUTLINE:\n{}\n\nBRIEF:\n{}\n\
             Use the primary keyword in the first paragraph. Return Markdown only.",
            format_outline(outline),
            format_brief(brief)
        );
        let draft = self.client.complete(&system, &prompt, 0.8).await?;
        Ok(strip_code_fences(&draft))
    }
}

// ============================================================================
// Fact checker
// ============================================================================

pub struct LlmFactChecker {
    client: Arc<LlmClient>,
}

impl LlmFactChecker {
    pub fn new(client: Arc<LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl FactChecker for LlmFactChecker {
    async fn identify_claims(&self, content: &str) -> CollaboratorResult<Vec<Claim>> {
        let prompt = format!(
            "List the factual claims in the article below.\n\
             Output JSON: {{\"claims\": [{{\"claim\": \"\", \"verification_needed\": true, \"confidence\": \"high|medium|low\"}}]}}\n\n\
             ARTICLE:\n{}",
            truncate_chars(content, MAX_PROMPT_CHARS)
        );
        let list: ClaimList = self.client.complete_json(FACT_CHECK_SYSTEM, &prompt, 0.3).await?;
        Ok(list.claims)
    }
}

// ============================================================================
// Prompt formatting
// ============================================================================

fn format_examples(examples: &[BrandExample]) -> String {
    let mut out = String::new();
    for (i, example) in examples.iter().enumerate() {
        let topic = example.metadata.get("topic").and_then(|v| v.as_str()).unwrap_or("n/a");
        let _ = writeln!(
            out,
            "Example {} (topic: {}):\n{}\n",
            i + 1,
            topic,
            truncate_chars(&example.content, EXAMPLE_PREVIEW_CHARS)
        );
    }
    out
}

/// Brief as prompt text; reviewer feedback goes last so it takes priority
pub(crate) fn format_brief(brief: &ContentBrief) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Topic: {}", brief.target_topic);
    let _ = writeln!(out, "Audience: {}", brief.target_audience);
    let _ = writeln!(out, "Technical level: {}", brief.technical_level);
    let _ = writeln!(out, "Primary keyword: {}", brief.primary_keyword);
    let _ = writeln!(out, "Secondary keywords: {}", brief.secondary_keywords.join(", "));
    let _ = writeln!(out, "Content gaps: {}", brief.content_gaps.join("; "));
    let _ = writeln!(out, "Unique angles: {}", brief.unique_angles.join("; "));
    let _ = writeln!(out, "Competitor structure: {}", brief.competitor_structure.join("; "));
    if let Some(feedback) = &brief.feedback {
        let _ = writeln!(out, "\nREVIEWER FEEDBACK (address all of it):\n{}", feedback);
    }
    out
}

pub(crate) fn format_outline(outline: &Outline) -> String {
    let mut out = format!("# {}\n", outline.h1);
    let _ = writeln!(out, "Meta description: {}", outline.meta_description);
    let _ = writeln!(out, "Target word count: {}", outline.target_word_count);
    for section in &outline.sections {
        let _ = writeln!(out, "\n## {}", section.h2);
        for point in &section.key_points {
            let _ = writeln!(out, "  - {}", point);
        }
        for h3 in &section.h3s {
            let _ = writeln!(out, "### {}", h3);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OutlineSection;

    #[test]
    fn test_feedback_appears_in_brief_prompt() {
        let brief = ContentBrief {
            target_topic: "DMARC".to_string(),
            primary_keyword: "dmarc policy".to_string(),
            ..Default::default()
        }
        .with_feedback("Add a rollout checklist");

        let text = format_brief(&brief);
        assert!(text.contains("Primary keyword: dmarc policy"));
        assert!(text.ends_with("Add a rollout checklist\n"));
    }

    #[test]
    fn test_outline_prompt_lists_sections() {
        let outline = Outline {
            h1: "DMARC Policy Guide".to_string(),
            meta_description: "How to roll out DMARC".to_string(),
            sections: vec![OutlineSection {
                h2: "Start with p=none".to_string(),
                h3s: vec!["Collect reports".to_string()],
                key_points: vec!["Monitor first".to_string()],
            }],
            target_word_count: 2000,
        };

        let text = format_outline(&outline);
        assert!(text.starts_with("# DMARC Policy Guide\n"));
        assert!(text.contains("## Start with p=none"));
        assert!(text.contains("### Collect reports"));
        assert!(text.contains("  - Monitor first"));
    }

    #[test]
    fn test_claims_default_when_missing() {
        let list: ClaimList = serde_json::from_str("{}").unwrap();
        assert!(list.claims.is_empty());
    }
}
