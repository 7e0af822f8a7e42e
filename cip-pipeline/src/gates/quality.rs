//! Quality gate
//!
//! Combines the plagiarism check, SEO analysis and fact-check claims into a
//! publication decision. Any blocking issue stops the pipeline before
//! formatting; warnings and recommendations are advisory.

use super::plagiarism::PlagiarismResult;
use super::seo::{SeoAnalysis, SeoMetrics};
use crate::config::SeoRules;
use crate::models::{Claim, DraftMetadata};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// Overall gate verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QualityStatus {
    Pass,
    Blocked,
}

impl fmt::Display for QualityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityStatus::Pass => write!(f, "PASS"),
            QualityStatus::Blocked => write!(f, "BLOCKED"),
        }
    }
}

/// Headline scores
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityScores {
    pub seo_score: f64,
    pub plagiarism_max_similarity: f64,
    /// Flesch reading ease
    pub readability_score: f64,
}

/// Quality gate report stored in the stage 7 payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub overall_status: QualityStatus,
    pub blocking_issues: Vec<String>,
    pub warnings: Vec<String>,
    pub scores: QualityScores,
    pub metrics: SeoMetrics,
    pub recommendations: Vec<String>,
}

impl QualityReport {
    pub fn passed(&self) -> bool {
        self.overall_status == QualityStatus::Pass
    }
}

/// Publication gate over a scored draft
#[derive(Debug, Clone, Default)]
pub struct QualityGate {
    rules: SeoRules,
}

impl QualityGate {
    pub fn new(rules: SeoRules) -> Self {
        Self { rules }
    }

    /// Build the report for a draft
    pub fn evaluate(
        &self,
        metadata: &DraftMetadata,
        plagiarism: &PlagiarismResult,
        seo: &SeoAnalysis,
        claims: &[Claim],
    ) -> QualityReport {
        let metrics = &seo.metrics;
        let blocking_issues = self.blocking_issues(metadata, plagiarism, metrics);
        let warnings = self.warnings(metrics, claims);
        let recommendations = self.recommendations(seo);

        let overall_status = if blocking_issues.is_empty() {
            QualityStatus::Pass
        } else {
            QualityStatus::Blocked
        };

        match overall_status {
            QualityStatus::Blocked => warn!(
                blocking = blocking_issues.len(),
                issues = ?blocking_issues,
                "Quality gate blocked draft"
            ),
            QualityStatus::Pass => info!(
                seo_score = seo.total_score,
                warnings = warnings.len(),
                "Quality gate passed"
            ),
        }

        QualityReport {
            overall_status,
            blocking_issues,
            warnings,
            scores: QualityScores {
                seo_score: seo.total_score,
                plagiarism_max_similarity: plagiarism.max_similarity,
                readability_score: metrics.flesch_reading_ease,
            },
            metrics: metrics.clone(),
            recommendations,
        }
    }

    fn blocking_issues(
        &self,
        metadata: &DraftMetadata,
        plagiarism: &PlagiarismResult,
        metrics: &SeoMetrics,
    ) -> Vec<String> {
        let mut issues = Vec::new();

        if !plagiarism.passed {
            issues.push(format!(
                "High plagiarism similarity detected: {:.2}%",
                plagiarism.max_similarity * 100.0
            ));
        }

        if metadata.h1.trim().is_empty() {
            issues.push("Missing H1 tag".to_string());
        }

        if metadata.meta_description.trim().is_empty() {
            issues.push("Missing meta description".to_string());
        }

        let flesch = metrics.flesch_reading_ease;
        if flesch < self.rules.readability.min {
            issues.push(format!("Readability too low (Flesch: {})", flesch));
        } else if flesch > self.rules.readability.max {
            issues.push(format!("Readability too high (Flesch: {})", flesch));
        }

        issues
    }

    fn warnings(&self, metrics: &SeoMetrics, claims: &[Claim]) -> Vec<String> {
        let mut warnings = Vec::new();

        if metrics.word_count < self.rules.word_count.min {
            warnings.push(format!("Word count below ideal ({} words)", metrics.word_count));
        } else if metrics.word_count > self.rules.word_count.max {
            warnings.push(format!("Word count above maximum ({} words)", metrics.word_count));
        }

        // Metrics carry density as a percentage
        let density = metrics.keyword_density;
        if density < self.rules.keyword_density.min * 100.0 {
            warnings.push(format!("Keyword density low ({}%)", density));
        } else if density > self.rules.keyword_density.max * 100.0 {
            warnings.push(format!("Keyword density high ({}%)", density));
        }

        if metrics.internal_link_opportunities < self.rules.internal_links.min {
            warnings.push("Insufficient internal linking opportunities".to_string());
        }

        let unverified = claims.iter().filter(|c| c.verification_needed).count();
        if unverified > 0 {
            warnings.push(format!("{} claims require verification", unverified));
        }

        warnings
    }

    fn recommendations(&self, seo: &SeoAnalysis) -> Vec<String> {
        let mut recommendations = Vec::new();
        if seo.metrics.word_count < self.rules.word_count.min {
            recommendations.push("Expand content to meet minimum word count".to_string());
        }
        if seo.total_score < self.rules.recommended_min_score {
            recommendations.push(format!(
                "Improve SEO optimization (target: {}+)",
                self.rules.recommended_min_score
            ));
        }
        if seo.metrics.keyword_density < self.rules.keyword_density.min * 100.0 {
            recommendations.push("Increase primary keyword usage naturally".to_string());
        }
        recommendations
    }
}
