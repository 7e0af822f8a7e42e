//! Test Helper Utilities
//!
//! Fake collaborators and a ready-made orchestrator over an in-memory database.
//! The fakes are deterministic: the embedder maps marker words to fixed vectors
//! so plagiarism similarity is known exactly, and the drafts were sized to land
//! inside the default word count and readability bands.

#![allow(dead_code)]

use cip_common::db::{init_database, init_memory_database};
use cip_pipeline::artifacts::ArtifactStore;
use cip_pipeline::config::PipelineSettings;
use cip_pipeline::models::{
    BrandExample, Claim, ContentAnalysis, ContentBrief, DraftMetadata, GapAnalysis, KeywordSet,
    Outline, OutlineSection,
};
use cip_pipeline::services::MarkdownFormatter;
use cip_pipeline::types::{
    AnalysisResult, ArticleFormatter, BrandCorpus, CollaboratorError, CollaboratorResult,
    Collaborators, ContentAnalyzer, ContentExtractor, ContentGenerator, CorpusStatus, Embedder,
    ExtractedContent, FactChecker, FormattedArticle,
};
use cip_pipeline::Orchestrator;
use serde_json::json;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use uuid::Uuid;

/// Host not on any risk list
pub const GREEN_URL: &str = "https://blog.example.com/dmarc-basics";
/// Host on the default medium-risk list
pub const YELLOW_URL: &str = "https://techcrunch.com/2026/03/dmarc-rollout";
/// Host on the default high-risk list
pub const RED_URL: &str = "https://www.nytimes.com/2026/03/email-security.html";

pub const PRIMARY_KEYWORD: &str = "dmarc policy";
pub const DRAFT_TITLE: &str = "DMARC Policy Guide for Busy Teams";

/// Every source sentence carries this word
pub const SOURCE_MARKER: &str = "lighthouse";
/// Draft chunks carrying this word embed at 0.90 similarity to the source
pub const COPY_MARKER: &str = "verbatim";

const SECTIONS: [&str; 4] = [
    "Start in Monitor Mode",
    "Read the Reports",
    "Fix Every Sender",
    "Move to Reject",
];

const SECTION_PARAGRAPH: &str = "A dmarc policy tells receiving mail servers what to do when a message fails authentication. \
Start with a policy of none so you can see who sends mail for your domain. \
Aggregate reports describe which services deliver mail on behalf of your domain and whether they pass. \
Fix the records for each sender you trust and drop the ones you do not know. \
When the reports stay clean for a few weeks, move to quarantine and then to reject.";

// ============================================================================
// Content fixtures
// ============================================================================

/// 840-word source article with no sensitive topics
pub fn source_text() -> String {
    "The lighthouse keeper sends a short note to the harbor office every single morning. ".repeat(60)
}

/// About 1600 words, Flesch near 73, keyword in the first paragraph, four H2 sections
pub fn clean_draft() -> String {
    draft_with(None)
}

/// Clean draft plus one paragraph the embedder treats as copied from the source
pub fn copied_draft() -> String {
    draft_with(Some(
        "The verbatim passage below was lifted word for word from the source article.",
    ))
}

fn draft_with(extra: Option<&str>) -> String {
    let mut out = vec![
        format!("# {}", DRAFT_TITLE),
        String::new(),
        "Every domain needs a dmarc policy. This guide shows how to roll one out in small steps without losing real mail."
            .to_string(),
        String::new(),
    ];
    for section in SECTIONS {
        out.push(format!("## {}", section));
        out.push(String::new());
        for _ in 0..5 {
            out.push(SECTION_PARAGRAPH.to_string());
            out.push(String::new());
        }
    }
    if let Some(extra) = extra {
        out.push(extra.to_string());
        out.push(String::new());
    }
    out.join("\n")
}

// ============================================================================
// Fakes
// ============================================================================

/// Returns the configured text, or a 404 when none is set
pub struct FakeExtractor {
    pub content: Option<String>,
}

#[async_trait::async_trait]
impl ContentExtractor for FakeExtractor {
    async fn extract(&self, url: &str) -> CollaboratorResult<ExtractedContent> {
        let content = self.content.clone().ok_or_else(|| CollaboratorError::Http {
            status: Some(404),
            message: format!("{} not found", url),
        })?;
        Ok(ExtractedContent {
            word_count: content.split_whitespace().count(),
            content,
            extraction_method: "fake".to_string(),
            source_url: url.to_string(),
            metadata: json!({ "title": "Harbor Notes" }),
        })
    }
}

pub struct FakeAnalyzer {
    pub fail: bool,
}

#[async_trait::async_trait]
impl ContentAnalyzer for FakeAnalyzer {
    async fn analyze(&self, _content: &str) -> CollaboratorResult<AnalysisResult> {
        if self.fail {
            return Err(CollaboratorError::InvalidResponse("analysis was not JSON".to_string()));
        }
        let analysis = ContentAnalysis {
            main_topic: "DMARC policy rollout".to_string(),
            target_audience: "IT administrators".to_string(),
            technical_level: "intermediate".to_string(),
            content_structure: vec!["introduction".to_string(), "steps".to_string()],
            key_points: vec!["monitor first".to_string()],
            missing_elements: vec!["no rollout timeline".to_string()],
        };
        let keywords = KeywordSet {
            primary_keywords: vec![
                PRIMARY_KEYWORD.to_string(),
                "dmarc".to_string(),
                "email authentication".to_string(),
            ],
            ..Default::default()
        };
        let gap_analysis = GapAnalysis {
            gaps: vec!["no reporting walkthrough".to_string()],
            ..Default::default()
        };
        Ok(AnalysisResult {
            content_brief: ContentBrief::compose(&analysis, &keywords, &gap_analysis),
            analysis,
            keywords,
            gap_analysis,
        })
    }
}

/// Maps marker words to fixed unit vectors
pub struct MarkerEmbedder;

impl MarkerEmbedder {
    pub fn vector(chunk: &str) -> Vec<f32> {
        let lower = chunk.to_lowercase();
        if lower.contains(SOURCE_MARKER) {
            vec![1.0, 0.0]
        } else if lower.contains(COPY_MARKER) {
            vec![0.9, 0.19f32.sqrt()]
        } else {
            vec![0.1, 0.99f32.sqrt()]
        }
    }
}

#[async_trait::async_trait]
impl Embedder for MarkerEmbedder {
    async fn embed(&self, chunks: &[String]) -> CollaboratorResult<Vec<Vec<f32>>> {
        Ok(chunks.iter().map(|c| Self::vector(c)).collect())
    }
}

/// Three-chunk corpus that reports population only on first use
#[derive(Default)]
pub struct FakeCorpus {
    loaded: AtomicBool,
}

#[async_trait::async_trait]
impl BrandCorpus for FakeCorpus {
    async fn ensure_populated(&self) -> CollaboratorResult<CorpusStatus> {
        let already = self.loaded.swap(true, Ordering::SeqCst);
        Ok(CorpusStatus {
            corpus_size: 3,
            populated: !already,
        })
    }

    async fn retrieve_brand_examples(&self, topic: &str, limit: usize) -> CollaboratorResult<Vec<BrandExample>> {
        if !self.loaded.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        Ok((0..limit.min(3))
            .map(|i| BrandExample {
                content: format!("Brand voice sample {} about {}", i, topic),
                metadata: json!({ "document": "voice.md", "chunk_index": i }),
            })
            .collect())
    }
}

/// Fixed outline and draft; records every brief it is given
pub struct FakeGenerator {
    pub draft: String,
    /// Draft returned once the brief carries reviewer feedback
    pub regenerated_draft: Option<String>,
    /// Fail draft generation whenever the brief carries reviewer feedback
    pub fail_with_feedback: bool,
    briefs: Mutex<Vec<ContentBrief>>,
}

impl FakeGenerator {
    pub fn new(draft: String, fail_with_feedback: bool) -> Self {
        Self {
            draft,
            regenerated_draft: None,
            fail_with_feedback,
            briefs: Mutex::new(Vec::new()),
        }
    }

    /// Briefs passed to `generate_draft`, oldest first
    pub fn briefs(&self) -> Vec<ContentBrief> {
        self.briefs.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ContentGenerator for FakeGenerator {
    async fn generate_outline(&self, _brief: &ContentBrief, _examples: &[BrandExample]) -> CollaboratorResult<Outline> {
        Ok(Outline {
            h1: DRAFT_TITLE.to_string(),
            meta_description: "Roll out a dmarc policy in small steps, read the reports, fix every sender and reach reject without losing legitimate mail.".to_string(),
            sections: SECTIONS
                .iter()
                .map(|h2| OutlineSection {
                    h2: h2.to_string(),
                    ..Default::default()
                })
                .collect(),
            target_word_count: 2000,
        })
    }

    async fn generate_draft(
        &self,
        _outline: &Outline,
        brief: &ContentBrief,
        _examples: &[BrandExample],
    ) -> CollaboratorResult<String> {
        self.briefs.lock().unwrap().push(brief.clone());
        if brief.feedback.is_some() {
            if self.fail_with_feedback {
                return Err(CollaboratorError::Unavailable("generator offline".to_string()));
            }
            if let Some(draft) = &self.regenerated_draft {
                return Ok(draft.clone());
            }
        }
        Ok(self.draft.clone())
    }
}

/// Formatter whose rendering service is down
pub struct FailingFormatter;

#[async_trait::async_trait]
impl ArticleFormatter for FailingFormatter {
    async fn format(&self, _markdown: &str, _metadata: &DraftMetadata) -> CollaboratorResult<FormattedArticle> {
        Err(CollaboratorError::Unavailable("formatter down".to_string()))
    }
}

pub struct FakeFactChecker;

#[async_trait::async_trait]
impl FactChecker for FakeFactChecker {
    async fn identify_claims(&self, _content: &str) -> CollaboratorResult<Vec<Claim>> {
        Ok(vec![Claim {
            claim: "Most domains never reach p=reject".to_string(),
            verification_needed: true,
            confidence: Some("medium".to_string()),
        }])
    }
}

// ============================================================================
// Harness
// ============================================================================

/// How the fakes behave for one test
pub struct Fakes {
    /// Extracted source text; `None` fails stage 1
    pub source: Option<String>,
    pub analysis_fails: bool,
    pub draft: String,
    /// Draft produced when reviewer feedback is present; defaults to `draft`
    pub regenerated_draft: Option<String>,
    pub regeneration_fails: bool,
    /// Stage 8 always fails
    pub formatter_fails: bool,
}

impl Default for Fakes {
    fn default() -> Self {
        Self {
            source: Some(source_text()),
            analysis_fails: false,
            draft: clean_draft(),
            regenerated_draft: None,
            regeneration_fails: false,
            formatter_fails: false,
        }
    }
}

/// Orchestrator wired to fakes, plus handles tests inspect
pub struct TestPipeline {
    pub orchestrator: Orchestrator,
    pub generator: Arc<FakeGenerator>,
    pub data_dir: TempDir,
}

pub async fn test_pipeline(fakes: Fakes) -> TestPipeline {
    let pool = init_memory_database().await.unwrap();
    test_pipeline_with_pool(fakes, pool, TempDir::new().unwrap())
}

/// Same as [`test_pipeline`] over a file-backed WAL database in `data_dir`,
/// so concurrent callers use separate connections
pub async fn test_pipeline_on_disk(fakes: Fakes) -> TestPipeline {
    let data_dir = TempDir::new().unwrap();
    let pool = init_database(&data_dir.path().join("cip.db")).await.unwrap();
    test_pipeline_with_pool(fakes, pool, data_dir)
}

fn test_pipeline_with_pool(fakes: Fakes, pool: SqlitePool, data_dir: TempDir) -> TestPipeline {
    let settings = PipelineSettings::default();

    let mut generator = FakeGenerator::new(fakes.draft, fakes.regeneration_fails);
    generator.regenerated_draft = fakes.regenerated_draft;
    let generator = Arc::new(generator);
    let formatter: Arc<dyn ArticleFormatter> = if fakes.formatter_fails {
        Arc::new(FailingFormatter)
    } else {
        Arc::new(MarkdownFormatter::new(settings.brand.clone()))
    };
    let collaborators = Collaborators {
        extractor: Arc::new(FakeExtractor { content: fakes.source }),
        analyzer: Arc::new(FakeAnalyzer { fail: fakes.analysis_fails }),
        embedder: Arc::new(MarkerEmbedder),
        corpus: Arc::new(FakeCorpus::default()),
        generator: generator.clone(),
        fact_checker: Arc::new(FakeFactChecker),
        formatter,
    };

    let orchestrator = Orchestrator::new(
        pool,
        settings,
        collaborators,
        ArtifactStore::new(data_dir.path()),
    );

    TestPipeline {
        orchestrator,
        generator,
        data_dir,
    }
}

/// Audit event types in order
pub async fn audit_types(orchestrator: &Orchestrator, id: Uuid) -> Vec<String> {
    orchestrator
        .get_audit_log(id)
        .await
        .unwrap()
        .into_iter()
        .map(|event| event.event_type)
        .collect()
}
