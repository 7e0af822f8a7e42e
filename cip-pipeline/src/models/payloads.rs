//! Typed per-stage payloads
//!
//! Each stage persists exactly one of these inside its success envelope. Later
//! stages decode the upstream payload they need instead of probing for keys.

use crate::gates::{PlagiarismResult, QualityReport, SafetyDecision, SeoAnalysis};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Stage 1: Extraction
// ============================================================================

/// Stage 1 payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub source_url: String,
    pub extraction_method: String,
    pub word_count: usize,
    #[serde(default)]
    pub metadata: Value,
    pub extracted_at: DateTime<Utc>,
    /// First 500 characters of the extracted text
    pub content_preview: String,
    /// Full text lives in the artifact store, not the database
    pub content_file: String,
    #[serde(skip)]
    pub content: String,
}

// ============================================================================
// Stage 2: Analysis
// ============================================================================

/// Structural analysis of the source article
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentAnalysis {
    pub main_topic: String,
    pub target_audience: String,
    pub technical_level: String,
    pub content_structure: Vec<String>,
    pub key_points: Vec<String>,
    pub missing_elements: Vec<String>,
}

/// Researched keywords, most important first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordSet {
    pub primary_keywords: Vec<String>,
    pub secondary_keywords: Vec<String>,
    pub long_tail_keywords: Vec<String>,
}

/// Gaps the source leaves open
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GapAnalysis {
    pub gaps: Vec<String>,
    pub unique_angles: Vec<String>,
    pub value_propositions: Vec<String>,
}

/// Generation guidance built from the analysis.
///
/// Reused unchanged across regeneration except for `feedback`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentBrief {
    pub target_topic: String,
    pub target_audience: String,
    pub technical_level: String,
    pub primary_keyword: String,
    #[serde(default)]
    pub secondary_keywords: Vec<String>,
    #[serde(default)]
    pub content_gaps: Vec<String>,
    #[serde(default)]
    pub unique_angles: Vec<String>,
    #[serde(default)]
    pub value_propositions: Vec<String>,
    #[serde(default)]
    pub competitor_structure: Vec<String>,
    #[serde(default)]
    pub suggested_improvements: Vec<String>,
    /// Reviewer feedback injected by regeneration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl ContentBrief {
    /// Build a brief from analysis results.
    ///
    /// The primary keyword is the first researched keyword, falling back to the
    /// main topic; up to three following keywords become secondary.
    pub fn compose(analysis: &ContentAnalysis, keywords: &KeywordSet, gaps: &GapAnalysis) -> Self {
        let primary_keyword = keywords
            .primary_keywords
            .first()
            .cloned()
            .unwrap_or_else(|| analysis.main_topic.clone());
        let secondary_keywords = keywords.primary_keywords.iter().skip(1).take(3).cloned().collect();

        Self {
            target_topic: analysis.main_topic.clone(),
            target_audience: analysis.target_audience.clone(),
            technical_level: analysis.technical_level.clone(),
            primary_keyword,
            secondary_keywords,
            content_gaps: gaps.gaps.clone(),
            unique_angles: gaps.unique_angles.clone(),
            value_propositions: gaps.value_propositions.clone(),
            competitor_structure: analysis.content_structure.clone(),
            suggested_improvements: analysis.missing_elements.clone(),
            feedback: None,
        }
    }

    /// Copy of this brief carrying reviewer feedback
    pub fn with_feedback(&self, feedback: impl Into<String>) -> Self {
        Self {
            feedback: Some(feedback.into()),
            ..self.clone()
        }
    }
}

/// Stage 2 payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub content_brief: ContentBrief,
    #[serde(default)]
    pub analysis: ContentAnalysis,
    #[serde(default)]
    pub keywords: KeywordSet,
    #[serde(default)]
    pub gap_analysis: GapAnalysis,
}

// ============================================================================
// Stage 3: Safety
// ============================================================================

/// Stage 3 payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyOutput {
    pub decision: SafetyDecision,
    /// Number of embedded source chunks saved as the fingerprint
    pub fingerprint_chunks: usize,
    pub fingerprint_file: String,
}

// ============================================================================
// Stage 4: RAG setup
// ============================================================================

/// Stage 4 payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagSetupOutput {
    /// Chunks in the brand corpus after setup
    pub corpus_size: usize,
    /// True when this run populated an empty corpus
    pub populated: bool,
}

/// Retrieved brand-voice reference passage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandExample {
    pub content: String,
    #[serde(default)]
    pub metadata: Value,
}

impl BrandExample {
    /// Fallback used when the corpus has nothing relevant
    pub fn default_example() -> Self {
        Self {
            content: "Write with clarity and authority. Lead with the reader's problem, \
                      explain the underlying concepts in plain language, back claims with \
                      concrete examples, and close each section with a practical next step."
                .to_string(),
            metadata: serde_json::json!({ "source": "default" }),
        }
    }
}

// ============================================================================
// Stage 5: Outline
// ============================================================================

/// One H2 section of the outline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineSection {
    pub h2: String,
    pub h3s: Vec<String>,
    pub key_points: Vec<String>,
}

/// Article outline produced by the generator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Outline {
    pub h1: String,
    pub meta_description: String,
    pub sections: Vec<OutlineSection>,
    pub target_word_count: u32,
}

/// Stage 5 payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineOutput {
    pub outline: Outline,
    pub brand_examples_used: usize,
    #[serde(default)]
    pub validation_warnings: Vec<String>,
}

// ============================================================================
// Stage 6: Draft
// ============================================================================

/// Metadata derived from the draft
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftMetadata {
    pub title: String,
    pub meta_description: String,
    pub slug: String,
    pub word_count: usize,
    pub h1: String,
    pub primary_keyword: String,
    pub secondary_keywords: Vec<String>,
}

/// Stage 6 payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftOutput {
    /// Markdown article
    pub content: String,
    pub metadata: DraftMetadata,
    #[serde(default)]
    pub validation_warnings: Vec<String>,
    pub draft_file: String,
}

// ============================================================================
// Stage 7: Quality assurance
// ============================================================================

/// Factual claim identified in the draft
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Claim {
    pub claim: String,
    pub verification_needed: bool,
    pub confidence: Option<String>,
}

/// Stage 7 payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaOutput {
    pub quality_report: QualityReport,
    pub plagiarism_check: PlagiarismResult,
    pub fact_check: Vec<Claim>,
    pub seo_analysis: SeoAnalysis,
}

// ============================================================================
// Stage 8: Formatting
// ============================================================================

/// Suggested internal link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalLink {
    pub text: String,
    pub url: String,
    pub utm_params: String,
}

/// Heading structure check of the rendered HTML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HtmlValidation {
    pub is_valid: bool,
    pub issues: Vec<String>,
}

/// Stage 8 payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatOutput {
    pub html_file: String,
    pub metadata_file: String,
    /// First 500 characters of the final HTML
    pub html_preview: String,
    pub suggested_links: Vec<InternalLink>,
    pub validation: HtmlValidation,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis() -> ContentAnalysis {
        ContentAnalysis {
            main_topic: "DMARC enforcement".to_string(),
            target_audience: "IT administrators".to_string(),
            technical_level: "intermediate".to_string(),
            content_structure: vec!["intro".to_string(), "steps".to_string()],
            key_points: vec![],
            missing_elements: vec!["no examples".to_string()],
        }
    }

    #[test]
    fn test_brief_uses_first_keyword_as_primary() {
        let keywords = KeywordSet {
            primary_keywords: vec![
                "dmarc policy".to_string(),
                "p=reject".to_string(),
                "spf".to_string(),
                "dkim".to_string(),
                "bimi".to_string(),
            ],
            ..Default::default()
        };
        let brief = ContentBrief::compose(&analysis(), &keywords, &GapAnalysis::default());

        assert_eq!(brief.primary_keyword, "dmarc policy");
        assert_eq!(brief.secondary_keywords, vec!["p=reject", "spf", "dkim"]);
        assert_eq!(brief.suggested_improvements, vec!["no examples"]);
        assert!(brief.feedback.is_none());
    }

    #[test]
    fn test_brief_falls_back_to_topic_without_keywords() {
        let brief = ContentBrief::compose(&analysis(), &KeywordSet::default(), &GapAnalysis::default());
        assert_eq!(brief.primary_keyword, "DMARC enforcement");
        assert!(brief.secondary_keywords.is_empty());
    }

    #[test]
    fn test_feedback_leaves_original_untouched() {
        let brief = ContentBrief::compose(&analysis(), &KeywordSet::default(), &GapAnalysis::default());
        let revised = brief.with_feedback("Add a rollout checklist");

        assert!(brief.feedback.is_none());
        assert_eq!(revised.feedback.as_deref(), Some("Add a rollout checklist"));
        assert_eq!(revised.primary_keyword, brief.primary_keyword);
    }

    #[test]
    fn test_extraction_content_not_serialized() {
        let output = ExtractionOutput {
            source_url: "https://blog.example.com/a".to_string(),
            extraction_method: "direct".to_string(),
            word_count: 3,
            metadata: Value::Null,
            extracted_at: Utc::now(),
            content_preview: "one two three".to_string(),
            content_file: "extractions/a.md".to_string(),
            content: "one two three".to_string(),
        };
        let value = serde_json::to_value(&output).unwrap();
        assert!(value.get("content").is_none());
    }
}
