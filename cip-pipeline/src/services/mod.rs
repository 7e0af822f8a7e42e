//! Production collaborators
//!
//! - [`HttpExtractor`]: reader service with direct-fetch fallback
//! - [`LlmClient`] plus the analyzer, generator and fact checker built on it
//! - [`HashingEmbedder`]: local deterministic embeddings
//! - [`SqliteCorpus`]: brand-voice corpus in the pipeline database
//! - [`MarkdownFormatter`]: HTML page with SEO and schema.org metadata

pub mod hashing_embedder;
pub mod http_extractor;
pub mod llm_agents;
pub mod llm_client;
pub mod markdown_formatter;
pub mod sqlite_corpus;

pub use hashing_embedder::HashingEmbedder;
pub use http_extractor::HttpExtractor;
pub use llm_agents::{LlmAnalyzer, LlmFactChecker, LlmGenerator};
pub use llm_client::LlmClient;
pub use markdown_formatter::MarkdownFormatter;
pub use sqlite_corpus::SqliteCorpus;

use crate::config::PipelineSettings;
use crate::types::{CollaboratorResult, Collaborators, Embedder};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Corpus directory when the settings name none
pub const DEFAULT_CORPUS_DIR: &str = "brand_corpus";

/// Wire the production collaborators for a root folder
pub fn default_collaborators(
    pool: SqlitePool,
    settings: &PipelineSettings,
    root: &Path,
) -> CollaboratorResult<Collaborators> {
    let llm = LlmClient::new(settings.llm.clone())?;
    if std::env::var(&settings.llm.api_key_env).map_or(true, |key| key.is_empty()) {
        warn!(env = %settings.llm.api_key_env, "LLM API key not set; requests will be unauthenticated");
    }
    let llm = Arc::new(llm);

    let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::default());
    let corpus_dir = settings
        .corpus
        .directory
        .clone()
        .unwrap_or_else(|| root.join(DEFAULT_CORPUS_DIR));

    info!(
        model = %settings.llm.model,
        corpus_dir = %corpus_dir.display(),
        "Collaborators configured"
    );

    Ok(Collaborators {
        extractor: Arc::new(HttpExtractor::new(settings.extraction.clone())?),
        analyzer: Arc::new(LlmAnalyzer::new(Arc::clone(&llm), settings.brand.name.clone())),
        embedder: Arc::clone(&embedder),
        corpus: Arc::new(SqliteCorpus::new(
            pool,
            embedder,
            corpus_dir,
            settings.corpus.chunk_words,
            settings.database.max_lock_wait_ms,
        )),
        generator: Arc::new(LlmGenerator::new(Arc::clone(&llm))),
        fact_checker: Arc::new(LlmFactChecker::new(llm)),
        formatter: Arc::new(MarkdownFormatter::new(settings.brand.clone())),
    })
}
