//! SEO scoring
//!
//! Six components, each scored 0-100 and combined with configured weights:
//!
//! | Component            | Scoring                                                        |
//! |----------------------|----------------------------------------------------------------|
//! | keyword_optimization | keyword in H1, keyword in intro, density within ideal band     |
//! | readability          | 100 inside ideal Flesch band, 60 inside allowed band, else 0   |
//! | structure            | single H1, H2 count in range, both H1 and H2 present           |
//! | content_length       | +50 at or above min words, +50 within [min, max]               |
//! | internal_linking     | +50 at or above min opportunities, +50 at or above ideal        |
//! | meta_optimization    | description length valid, description contains keyword        |

use crate::config::{LinkTopic, SeoRules};
use crate::models::DraftMetadata;
use crate::text::{
    contains_ignore_case, count_words, extract_headings, find_internal_link_opportunities,
    first_paragraph, flesch_reading_ease, keyword_density, strip_markdown,
    validate_meta_description,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Component scores (0-100 each)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub keyword_optimization: f64,
    pub readability: f64,
    pub structure: f64,
    pub content_length: f64,
    pub internal_linking: f64,
    pub meta_optimization: f64,
}

/// Raw measurements behind the scores
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeoMetrics {
    pub word_count: usize,
    /// Rounded to one decimal
    pub flesch_reading_ease: f64,
    /// Percent, rounded to two decimals
    pub keyword_density: f64,
    pub h2_count: usize,
    pub internal_link_opportunities: usize,
}

/// SEO analysis of a draft
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeoAnalysis {
    /// Weighted total, rounded to one decimal
    pub total_score: f64,
    pub component_scores: ComponentScores,
    pub metrics: SeoMetrics,
    /// Internal pages the draft could link to
    pub internal_links: Vec<String>,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Score a Markdown draft against the SEO rules
pub fn score_seo(
    content: &str,
    metadata: &DraftMetadata,
    rules: &SeoRules,
    link_topics: &[LinkTopic],
) -> SeoAnalysis {
    let text = strip_markdown(content);

    // Content length
    let word_count = count_words(&text);
    let mut content_length = 0.0;
    if word_count >= rules.word_count.min {
        content_length += 50.0;
    }
    if rules.word_count.contains(word_count) {
        content_length += 50.0;
    }

    // Readability
    let flesch = flesch_reading_ease(&text);
    let band = &rules.readability;
    let readability = if (band.ideal_min..=band.ideal_max).contains(&flesch) {
        100.0
    } else if (band.min..=band.max).contains(&flesch) {
        60.0
    } else {
        0.0
    };

    // Keyword optimization
    let primary_keyword = if metadata.primary_keyword.trim().is_empty() {
        metadata.title.split_whitespace().next().unwrap_or("").to_string()
    } else {
        metadata.primary_keyword.clone()
    };
    let points = &rules.keyword_points;
    let mut keyword_score = 0.0;
    if contains_ignore_case(&metadata.h1, &primary_keyword) {
        keyword_score += points.primary_in_h1;
    }
    if contains_ignore_case(first_paragraph(content), &primary_keyword) {
        keyword_score += points.primary_in_intro;
    }
    let density = keyword_density(&text, &primary_keyword);
    if rules.keyword_density.contains(density) {
        keyword_score += points.primary_density_ideal;
    }

    // Structure
    let headings = extract_headings(content);
    let h2_count = headings.h2().len();
    let structure_points = &rules.structure_points;
    let mut structure = 0.0;
    if headings.h1().len() == 1 {
        structure += structure_points.h1_present;
    }
    if rules.h2_sections.contains(h2_count) {
        structure += structure_points.h2_count_ideal;
    }
    if !headings.h1().is_empty() && h2_count > 0 {
        structure += structure_points.heading_hierarchy;
    }

    // Internal linking
    let internal_links = find_internal_link_opportunities(&text, link_topics);
    let mut internal_linking = 0.0;
    if internal_links.len() >= rules.internal_links.min {
        internal_linking += 50.0;
    }
    if internal_links.len() >= rules.internal_links.ideal {
        internal_linking += 50.0;
    }

    // Meta optimization
    let meta_points = &rules.meta_points;
    let mut meta = 0.0;
    let (meta_valid, meta_message) =
        validate_meta_description(&metadata.meta_description, &rules.meta_description_length);
    if meta_valid {
        meta += meta_points.description_length;
    }
    if contains_ignore_case(&metadata.meta_description, &primary_keyword) {
        meta += meta_points.description_includes_keyword;
    }

    let component_scores = ComponentScores {
        keyword_optimization: round_to(keyword_score, 1),
        readability: round_to(readability, 1),
        structure: round_to(structure, 1),
        content_length: round_to(content_length, 1),
        internal_linking: round_to(internal_linking, 1),
        meta_optimization: round_to(meta, 1),
    };
    let total_score = round_to(weighted_total(&component_scores, rules), 1);

    debug!(
        total_score,
        keyword = component_scores.keyword_optimization,
        readability = component_scores.readability,
        structure = component_scores.structure,
        content_length = component_scores.content_length,
        internal_linking = component_scores.internal_linking,
        meta = component_scores.meta_optimization,
        meta_check = %meta_message,
        "SEO score breakdown"
    );

    SeoAnalysis {
        total_score,
        component_scores,
        metrics: SeoMetrics {
            word_count,
            flesch_reading_ease: round_to(flesch, 1),
            keyword_density: round_to(density * 100.0, 2),
            h2_count,
            internal_link_opportunities: internal_links.len(),
        },
        internal_links,
    }
}

/// Weighted sum of component scores
pub fn weighted_total(scores: &ComponentScores, rules: &SeoRules) -> f64 {
    let w = &rules.weights;
    scores.keyword_optimization * w.keyword_optimization
        + scores.readability * w.readability
        + scores.structure * w.structure
        + scores.content_length * w.content_length
        + scores.internal_linking * w.internal_linking
        + scores.meta_optimization * w.meta_optimization
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrandSettings;

    fn metadata(meta: &str) -> DraftMetadata {
        DraftMetadata {
            title: "DMARC Setup Guide".to_string(),
            meta_description: meta.to_string(),
            slug: "dmarc-setup-guide".to_string(),
            word_count: 0,
            h1: "DMARC Setup Guide".to_string(),
            primary_keyword: "dmarc".to_string(),
            secondary_keywords: vec![],
        }
    }

    #[test]
    fn test_weighted_total_of_perfect_scores_is_100() {
        let perfect = ComponentScores {
            keyword_optimization: 100.0,
            readability: 100.0,
            structure: 100.0,
            content_length: 100.0,
            internal_linking: 100.0,
            meta_optimization: 100.0,
        };
        let total = weighted_total(&perfect, &SeoRules::default());
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_unstructured_draft_scores_low() {
        let analysis = score_seo(
            "Just a few words.",
            &metadata(""),
            &SeoRules::default(),
            &BrandSettings::default().link_topics,
        );
        assert_eq!(analysis.component_scores.content_length, 0.0);
        assert_eq!(analysis.component_scores.structure, 0.0);
        assert_eq!(analysis.component_scores.meta_optimization, 0.0);
        assert_eq!(analysis.metrics.word_count, 4);
        assert!(analysis.total_score < 30.0);
    }

    #[test]
    fn test_structure_components() {
        let content = "# DMARC Setup Guide\n\nDMARC intro.\n\n## One\n\n## Two\n\n## Three\n";
        let analysis = score_seo(
            content,
            &metadata(""),
            &SeoRules::default(),
            &BrandSettings::default().link_topics,
        );
        assert_eq!(analysis.component_scores.structure, 100.0);
        assert_eq!(analysis.metrics.h2_count, 3);
        // Keyword in H1 and in the intro paragraph
        assert!(analysis.component_scores.keyword_optimization >= 70.0);
    }

    #[test]
    fn test_meta_points() {
        let meta = format!("Learn how dmarc protects your domain. {}", "x".repeat(120));
        assert!(meta.len() >= 150 && meta.len() <= 160);
        let analysis = score_seo(
            "# DMARC\n\nBody",
            &metadata(&meta),
            &SeoRules::default(),
            &[],
        );
        assert_eq!(analysis.component_scores.meta_optimization, 100.0);
    }

    #[test]
    fn test_internal_link_component() {
        let content = "# Guide\n\nDMARC, SPF and DKIM keep phishing away.";
        let analysis = score_seo(
            content,
            &metadata(""),
            &SeoRules::default(),
            &BrandSettings::default().link_topics,
        );
        assert_eq!(analysis.metrics.internal_link_opportunities, 4);
        assert_eq!(analysis.component_scores.internal_linking, 100.0);
    }
}
