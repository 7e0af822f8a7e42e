//! Core types and collaborator traits
//!
//! Stages depend only on the traits defined here. Production implementations
//! live in `services`; tests substitute fakes. Everything is injected through
//! [`Collaborators`] at orchestrator construction.

use crate::error::PipelineError;
use crate::models::{
    AnalysisOutput, BrandExample, Claim, ContentAnalysis, ContentBrief, DraftMetadata, GapAnalysis,
    KeywordSet, Outline,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Collaborator results
// ============================================================================

/// Text pulled from a source article
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedContent {
    pub content: String,
    pub word_count: usize,
    /// Which strategy produced the text ("jina", "direct", ...)
    pub extraction_method: String,
    pub source_url: String,
    pub metadata: Value,
}

/// Analyzer output; the brief is composed from the other three parts
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub content_brief: ContentBrief,
    pub analysis: ContentAnalysis,
    pub keywords: KeywordSet,
    pub gap_analysis: GapAnalysis,
}

impl From<AnalysisResult> for AnalysisOutput {
    fn from(result: AnalysisResult) -> Self {
        AnalysisOutput {
            content_brief: result.content_brief,
            analysis: result.analysis,
            keywords: result.keywords,
            gap_analysis: result.gap_analysis,
        }
    }
}

/// Brand corpus readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusStatus {
    /// Chunks stored after the call
    pub corpus_size: usize,
    /// True when this call loaded an empty corpus
    pub populated: bool,
}

/// Rendered article
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedArticle {
    /// Complete HTML document
    pub html: String,
    /// Publication metadata (title, slug, schema, ...)
    pub metadata: Value,
}

/// Collaborator error
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// Transport failure or error status from a remote service
    #[error("HTTP error{}: {message}", status.map(|s| format!(" {}", s)).unwrap_or_default())]
    Http { status: Option<u16>, message: String },

    /// Remote service asked us to slow down
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Response arrived but could not be used
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Extracted source too short to work from
    #[error("Insufficient content: {word_count} words (minimum {minimum})")]
    InsufficientContent { word_count: usize, minimum: usize },

    /// Collaborator not configured or not reachable
    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}

impl CollaboratorError {
    /// Worth retrying with backoff
    pub fn is_transient(&self) -> bool {
        match self {
            CollaboratorError::Http { status, .. } => status.map_or(true, |s| s >= 500),
            CollaboratorError::RateLimited(_) => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return CollaboratorError::InvalidResponse(err.to_string());
        }
        match err.status() {
            Some(status) if status.as_u16() == 429 => CollaboratorError::RateLimited(err.to_string()),
            status => CollaboratorError::Http {
                status: status.map(|s| s.as_u16()),
                message: err.to_string(),
            },
        }
    }
}

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

// ============================================================================
// Collaborator traits
// ============================================================================

/// Fetches a source article as plain text
#[async_trait::async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> CollaboratorResult<ExtractedContent>;
}

/// Produces topic, keyword and gap analysis for a source article
#[async_trait::async_trait]
pub trait ContentAnalyzer: Send + Sync {
    async fn analyze(&self, content: &str) -> CollaboratorResult<AnalysisResult>;
}

/// Embeds text chunks.
///
/// Identical text must always produce identical vectors.
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, chunks: &[String]) -> CollaboratorResult<Vec<Vec<f32>>>;
}

/// Brand-voice reference corpus
#[async_trait::async_trait]
pub trait BrandCorpus: Send + Sync {
    /// Load the corpus if empty; a no-op otherwise
    async fn ensure_populated(&self) -> CollaboratorResult<CorpusStatus>;

    /// Up to `limit` passages relevant to `topic`; empty when unpopulated
    async fn retrieve_brand_examples(
        &self,
        topic: &str,
        limit: usize,
    ) -> CollaboratorResult<Vec<BrandExample>>;
}

/// Writes outlines and drafts
#[async_trait::async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate_outline(
        &self,
        brief: &ContentBrief,
        examples: &[BrandExample],
    ) -> CollaboratorResult<Outline>;

    /// Markdown draft following the outline
    async fn generate_draft(
        &self,
        outline: &Outline,
        brief: &ContentBrief,
        examples: &[BrandExample],
    ) -> CollaboratorResult<String>;
}

/// Identifies factual claims needing verification
#[async_trait::async_trait]
pub trait FactChecker: Send + Sync {
    async fn identify_claims(&self, content: &str) -> CollaboratorResult<Vec<Claim>>;
}

/// Renders the final article
#[async_trait::async_trait]
pub trait ArticleFormatter: Send + Sync {
    async fn format(&self, markdown: &str, metadata: &DraftMetadata)
        -> CollaboratorResult<FormattedArticle>;
}

/// Collaborator set injected into the orchestrator
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn ContentExtractor>,
    pub analyzer: Arc<dyn ContentAnalyzer>,
    pub embedder: Arc<dyn Embedder>,
    pub corpus: Arc<dyn BrandCorpus>,
    pub generator: Arc<dyn ContentGenerator>,
    pub fact_checker: Arc<dyn FactChecker>,
    pub formatter: Arc<dyn ArticleFormatter>,
}

// ============================================================================
// Stage outcomes
// ============================================================================

/// Result of one stage run
#[derive(Debug)]
pub enum StageOutcome<T> {
    /// Stage finished; the pipeline continues
    Completed(T),
    /// Stage finished but a gate stopped the pipeline; the output is still stored
    Blocked { output: T, reasons: Vec<String> },
    /// Stage could not produce an output
    Failed(StageFailure),
}

impl<T> StageOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, StageOutcome::Completed(_))
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, StageOutcome::Blocked { .. })
    }
}

/// Why a stage failed
#[derive(Debug, Clone, PartialEq)]
pub struct StageFailure {
    pub message: String,
    /// Formatted error chain, stored as the traceback
    pub detail: Option<String>,
}

impl StageFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }

    fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        Self {
            message: err.to_string(),
            detail: Some(error_chain(err)),
        }
    }
}

impl From<CollaboratorError> for StageFailure {
    fn from(err: CollaboratorError) -> Self {
        StageFailure::from_error(&err)
    }
}

impl From<PipelineError> for StageFailure {
    fn from(err: PipelineError) -> Self {
        StageFailure::from_error(&err)
    }
}

impl From<cip_common::Error> for StageFailure {
    fn from(err: cip_common::Error) -> Self {
        StageFailure::from_error(&err)
    }
}

/// Format an error and its sources, one per line
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut lines = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        lines.push(format!("caused by: {}", cause));
        source = cause.source();
    }
    lines.join("\n")
}
