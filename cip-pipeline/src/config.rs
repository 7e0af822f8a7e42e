//! Pipeline settings
//!
//! Loaded from `<root>/config.toml`. Every section and field has a default, so
//! a missing file or a partial file both work. Example:
//!
//! ```toml
//! [safety]
//! high_risk = ["nytimes.com", "wsj.com"]
//! medium_risk = ["competitor.io"]
//!
//! [quality]
//! plagiarism_threshold = 0.85
//!
//! [llm]
//! model = "gpt-4o-mini"
//! ```

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// All pipeline settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub safety: SafetySettings,
    pub seo: SeoRules,
    pub quality: QualitySettings,
    pub extraction: ExtractionSettings,
    pub llm: LlmSettings,
    pub corpus: CorpusSettings,
    pub brand: BrandSettings,
    pub database: DatabaseSettings,
}

impl PipelineSettings {
    /// Load from a TOML file (defaults when absent) and validate
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let settings: PipelineSettings = cip_common::config::load_toml_or_default(path)?;
        settings.validate()?;
        info!(path = %path.display(), "Pipeline settings loaded");
        Ok(settings)
    }

    /// Reject settings the gates cannot work with
    pub fn validate(&self) -> PipelineResult<()> {
        let weight_sum = self.seo.weights.sum();
        if (weight_sum - 1.0).abs() > 0.001 {
            return Err(PipelineError::Config(format!(
                "SEO weights must sum to 1.0 (got {:.3})",
                weight_sum
            )));
        }

        let band = &self.seo.readability;
        if !(band.min <= band.ideal_min && band.ideal_min <= band.ideal_max && band.ideal_max <= band.max) {
            return Err(PipelineError::Config(
                "readability band must satisfy min <= ideal_min <= ideal_max <= max".to_string(),
            ));
        }

        if self.seo.word_count.min > self.seo.word_count.max {
            return Err(PipelineError::Config("word_count.min exceeds word_count.max".to_string()));
        }

        if !(0.0..=1.0).contains(&self.quality.plagiarism_threshold) {
            return Err(PipelineError::Config(format!(
                "plagiarism_threshold must be within [0, 1] (got {})",
                self.quality.plagiarism_threshold
            )));
        }

        if self.safety.chunk_words == 0 || self.corpus.chunk_words == 0 {
            return Err(PipelineError::Config("chunk sizes must be positive".to_string()));
        }

        Ok(())
    }
}

// ============================================================================
// Safety
// ============================================================================

/// Source classification for the safety gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetySettings {
    /// Host substrings that halt the pipeline
    pub high_risk: Vec<String>,
    /// Host substrings that force human review
    pub medium_risk: Vec<String>,
    /// Sources longer than this are treated as medium risk
    pub long_form_word_threshold: usize,
    /// Words per fingerprint chunk
    pub chunk_words: usize,
}

impl Default for SafetySettings {
    fn default() -> Self {
        Self {
            high_risk: vec![
                "nytimes.com".to_string(),
                "wsj.com".to_string(),
                "washingtonpost.com".to_string(),
                "bloomberg.com".to_string(),
                "forbes.com".to_string(),
                "wired.com".to_string(),
            ],
            medium_risk: vec![
                "techcrunch.com".to_string(),
                "zdnet.com".to_string(),
                "darkreading.com".to_string(),
            ],
            long_form_word_threshold: 3000,
            chunk_words: 500,
        }
    }
}

// ============================================================================
// SEO rules
// ============================================================================

/// Inclusive numeric range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range<T> {
    pub min: T,
    pub max: T,
}

impl<T: PartialOrd + Copy> Range<T> {
    pub fn contains(&self, value: T) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Flesch reading-ease band. Outside [min, max] blocks publication.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadabilityBand {
    pub min: f64,
    pub max: f64,
    pub ideal_min: f64,
    pub ideal_max: f64,
}

/// Minimum and ideal counts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkTargets {
    pub min: usize,
    pub ideal: usize,
}

/// Points for the keyword optimization component (sum to 100)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeywordPoints {
    pub primary_in_h1: f64,
    pub primary_in_intro: f64,
    pub primary_density_ideal: f64,
}

/// Points for the structure component (sum to 100)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructurePoints {
    pub h1_present: f64,
    pub h2_count_ideal: f64,
    pub heading_hierarchy: f64,
}

/// Points for the meta optimization component (sum to 100)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetaPoints {
    pub description_length: f64,
    pub description_includes_keyword: f64,
}

/// Component weights for the overall SEO score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeoWeights {
    pub keyword_optimization: f64,
    pub readability: f64,
    pub structure: f64,
    pub content_length: f64,
    pub internal_linking: f64,
    pub meta_optimization: f64,
}

impl SeoWeights {
    pub fn sum(&self) -> f64 {
        self.keyword_optimization
            + self.readability
            + self.structure
            + self.content_length
            + self.internal_linking
            + self.meta_optimization
    }
}

/// SEO thresholds and scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeoRules {
    pub word_count: Range<usize>,
    pub readability: ReadabilityBand,
    /// Primary keyword density as a fraction (0.01 = 1%)
    pub keyword_density: Range<f64>,
    pub h2_sections: Range<usize>,
    pub internal_links: LinkTargets,
    /// Meta description length in characters
    pub meta_description_length: Range<usize>,
    pub keyword_points: KeywordPoints,
    pub structure_points: StructurePoints,
    pub meta_points: MetaPoints,
    pub weights: SeoWeights,
    /// SEO score below which an improvement recommendation is added
    pub recommended_min_score: f64,
}

impl Default for SeoRules {
    fn default() -> Self {
        Self {
            word_count: Range { min: 1500, max: 3000 },
            readability: ReadabilityBand {
                min: 30.0,
                max: 80.0,
                ideal_min: 45.0,
                ideal_max: 70.0,
            },
            keyword_density: Range { min: 0.005, max: 0.025 },
            h2_sections: Range { min: 3, max: 8 },
            internal_links: LinkTargets { min: 2, ideal: 3 },
            meta_description_length: Range { min: 150, max: 160 },
            keyword_points: KeywordPoints {
                primary_in_h1: 40.0,
                primary_in_intro: 30.0,
                primary_density_ideal: 30.0,
            },
            structure_points: StructurePoints {
                h1_present: 40.0,
                h2_count_ideal: 30.0,
                heading_hierarchy: 30.0,
            },
            meta_points: MetaPoints {
                description_length: 50.0,
                description_includes_keyword: 50.0,
            },
            weights: SeoWeights {
                keyword_optimization: 0.25,
                readability: 0.20,
                structure: 0.15,
                content_length: 0.15,
                internal_linking: 0.10,
                meta_optimization: 0.15,
            },
            recommended_min_score: 70.0,
        }
    }
}

// ============================================================================
// Quality
// ============================================================================

/// Quality gate thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualitySettings {
    /// Max cosine similarity at or above which the draft is blocked
    pub plagiarism_threshold: f64,
    /// Words per plagiarism chunk
    pub chunk_words: usize,
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            plagiarism_threshold: 0.85,
            chunk_words: 500,
        }
    }
}

// ============================================================================
// External collaborators
// ============================================================================

/// Source extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Extracted text shorter than this fails stage 1
    pub min_words: usize,
    /// Reader service prefix; the source URL is appended
    pub jina_base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            min_words: 500,
            jina_base_url: "https://r.jina.ai".to_string(),
            timeout_secs: 30,
            user_agent: concat!("cip-pipeline/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Chat-completions endpoint used for analysis, generation and fact checking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub max_attempts: u32,
    pub timeout_secs: u64,
    /// Backoff cap between attempts
    pub max_backoff_secs: u64,
    pub temperature: f32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "CIP_LLM_API_KEY".to_string(),
            max_attempts: 3,
            timeout_secs: 60,
            max_backoff_secs: 60,
            temperature: 0.7,
        }
    }
}

/// Brand-voice corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusSettings {
    /// Directory of Markdown files; defaults to `<root>/brand_corpus`
    pub directory: Option<PathBuf>,
    /// Max words per corpus chunk
    pub chunk_words: usize,
    pub outline_examples: usize,
    pub draft_examples: usize,
}

impl Default for CorpusSettings {
    fn default() -> Self {
        Self {
            directory: None,
            chunk_words: 800,
            outline_examples: 5,
            draft_examples: 3,
        }
    }
}

/// Keyword to internal page mapping used for link suggestions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkTopic {
    pub keyword: String,
    pub page: String,
}

impl LinkTopic {
    fn new(keyword: &str, page: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            page: page.to_string(),
        }
    }
}

/// Publisher identity for formatted output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrandSettings {
    pub name: String,
    pub logo_url: String,
    /// Path prefix for internal link suggestions
    pub blog_path: String,
    pub link_topics: Vec<LinkTopic>,
}

impl Default for BrandSettings {
    fn default() -> Self {
        Self {
            name: "Sendmarc".to_string(),
            logo_url: "https://sendmarc.com/logo.png".to_string(),
            blog_path: "/blog".to_string(),
            link_topics: vec![
                LinkTopic::new("dmarc", "DMARC Guide"),
                LinkTopic::new("spf", "SPF Configuration"),
                LinkTopic::new("dkim", "DKIM Setup"),
                LinkTopic::new("email authentication", "Email Authentication"),
                LinkTopic::new("phishing", "Phishing Prevention"),
                LinkTopic::new("domain spoofing", "Domain Spoofing Protection"),
                LinkTopic::new("email security", "Email Security Best Practices"),
                LinkTopic::new("dmarc policy", "DMARC Policy Configuration"),
                LinkTopic::new("dmarc report", "DMARC Reporting"),
                LinkTopic::new("email deliverability", "Email Deliverability"),
            ],
        }
    }
}

/// Persistence tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Total time to keep retrying a locked write
    pub max_lock_wait_ms: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self { max_lock_wait_ms: 5000 }
    }
}
