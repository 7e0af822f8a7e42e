//! Brand-voice corpus stored in SQLite
//!
//! Population reads every `*.md` file in the corpus directory, splits it into
//! paragraph-aligned chunks, tags each chunk with a detected topic and
//! technical level, embeds it and stores it in `brand_corpus`. Retrieval ranks
//! stored chunks by cosine similarity to the embedded topic.

use crate::db::corpus::{count_chunks, insert_chunks, load_chunks, CorpusChunk};
use crate::gates::cosine_similarity;
use crate::models::BrandExample;
use crate::text::chunk_paragraphs;
use crate::types::{BrandCorpus, CollaboratorError, CollaboratorResult, CorpusStatus, Embedder};
use serde_json::json;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Used when the corpus directory does not exist so retrieval still has a voice
const SAMPLE_DOCUMENT: &str = "sample.md";
const SAMPLE_CONTENT: &str = "# Understanding DMARC: A Comprehensive Guide

DMARC (Domain-based Message Authentication, Reporting, and Conformance) is an email authentication protocol that builds on SPF and DKIM to prevent email spoofing and phishing attacks.

## Why DMARC Matters

Email remains one of the primary attack vectors for cybercriminals. Without proper authentication, attackers can impersonate your domain, damaging your brand reputation and putting your customers at risk.

## How DMARC Works

DMARC lets domain owners publish policies in their DNS records that specify how to handle emails that fail authentication checks. This gives you control over your domain's email security posture.";

const TECHNICAL_TERMS: [&str; 6] = ["implementation", "configuration", "dns", "record", "policy", "protocol"];

pub struct SqliteCorpus {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
    directory: PathBuf,
    chunk_words: usize,
    max_wait_ms: u64,
}

impl SqliteCorpus {
    pub fn new(
        pool: SqlitePool,
        embedder: Arc<dyn Embedder>,
        directory: impl Into<PathBuf>,
        chunk_words: usize,
        max_wait_ms: u64,
    ) -> Self {
        Self {
            pool,
            embedder,
            directory: directory.into(),
            chunk_words,
            max_wait_ms,
        }
    }

    /// (document name, content) pairs to load
    async fn read_documents(&self) -> CollaboratorResult<Vec<(String, String)>> {
        if !self.directory.is_dir() {
            warn!(
                directory = %self.directory.display(),
                "Corpus directory not found, loading built-in sample"
            );
            return Ok(vec![(SAMPLE_DOCUMENT.to_string(), SAMPLE_CONTENT.to_string())]);
        }

        let mut paths: Vec<PathBuf> = WalkDir::new(&self.directory)
            .follow_links(false)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable corpus entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && is_markdown(entry.path()))
            .map(|entry| entry.into_path())
            .collect();
        paths.sort();

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => documents.push((name, content)),
                Err(e) => warn!(file = %path.display(), error = %e, "Skipping unreadable corpus file"),
            }
        }
        Ok(documents)
    }
}

#[async_trait::async_trait]
impl BrandCorpus for SqliteCorpus {
    async fn ensure_populated(&self) -> CollaboratorResult<CorpusStatus> {
        let existing = count_chunks(&self.pool).await.map_err(storage_error)?;
        if existing > 0 {
            debug!(chunks = existing, "Brand corpus already populated");
            return Ok(CorpusStatus {
                corpus_size: existing,
                populated: false,
            });
        }

        let documents = self.read_documents().await?;
        let mut chunks = Vec::new();
        for (document, content) in &documents {
            let topic = detect_topic(content);
            let technical_level = detect_technical_level(content);
            let pieces = chunk_paragraphs(content, self.chunk_words);
            let embeddings = self.embedder.embed(&pieces).await?;

            for (chunk_index, (piece, embedding)) in pieces.into_iter().zip(embeddings).enumerate() {
                chunks.push(CorpusChunk {
                    document: document.clone(),
                    chunk_index,
                    content: piece,
                    topic: topic.to_string(),
                    technical_level: technical_level.to_string(),
                    embedding,
                });
            }
        }

        if chunks.is_empty() {
            warn!(directory = %self.directory.display(), "No Markdown files found for brand corpus");
        } else {
            insert_chunks(&self.pool, &chunks, self.max_wait_ms)
                .await
                .map_err(storage_error)?;
        }

        let corpus_size = count_chunks(&self.pool).await.map_err(storage_error)?;
        info!(documents = documents.len(), chunks = corpus_size, "Brand corpus populated");
        Ok(CorpusStatus {
            corpus_size,
            populated: corpus_size > 0,
        })
    }

    async fn retrieve_brand_examples(&self, topic: &str, limit: usize) -> CollaboratorResult<Vec<BrandExample>> {
        let stored = load_chunks(&self.pool).await.map_err(storage_error)?;
        if stored.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let query = self
            .embedder
            .embed(&[topic.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CollaboratorError::InvalidResponse("embedder returned no vector".to_string()))?;

        let mut scored: Vec<(f64, CorpusChunk)> = stored
            .into_iter()
            .map(|chunk| (cosine_similarity(&query, &chunk.embedding), chunk))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(similarity, chunk)| BrandExample {
                content: chunk.content,
                metadata: json!({
                    "document": chunk.document,
                    "chunk_index": chunk.chunk_index,
                    "topic": chunk.topic,
                    "technical_level": chunk.technical_level,
                    "similarity": similarity,
                }),
            })
            .collect())
    }
}

fn storage_error(err: cip_common::Error) -> CollaboratorError {
    CollaboratorError::Unavailable(format!("brand corpus storage: {}", err))
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("md"))
        .unwrap_or(false)
}

/// Coarse topic tag from keyword presence
pub fn detect_topic(content: &str) -> &'static str {
    let lower = content.to_lowercase();
    if lower.contains("dmarc") {
        "dmarc"
    } else if lower.contains("spf") || lower.contains("dkim") {
        "email_authentication"
    } else if lower.contains("phishing") {
        "phishing"
    } else if lower.contains("security") {
        "email_security"
    } else {
        "general"
    }
}

/// Technical level from the number of technical term occurrences
pub fn detect_technical_level(content: &str) -> &'static str {
    let lower = content.to_lowercase();
    let mentions: usize = TECHNICAL_TERMS.iter().map(|term| lower.matches(term).count()).sum();
    match mentions {
        n if n > 10 => "advanced",
        n if n > 5 => "intermediate",
        _ => "beginner",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::HashingEmbedder;
    use cip_common::db::init_memory_database;
    use tempfile::TempDir;

    fn corpus(pool: SqlitePool, dir: &Path) -> SqliteCorpus {
        SqliteCorpus::new(pool, Arc::new(HashingEmbedder::default()), dir, 800, 1000)
    }

    #[test]
    fn test_topic_detection_priority() {
        assert_eq!(detect_topic("DMARC and SPF"), "dmarc");
        assert_eq!(detect_topic("Set up DKIM keys"), "email_authentication");
        assert_eq!(detect_topic("Spot phishing early"), "phishing");
        assert_eq!(detect_topic("Security awareness"), "email_security");
        assert_eq!(detect_topic("Quarterly update"), "general");
    }

    #[test]
    fn test_technical_level_thresholds() {
        assert_eq!(detect_technical_level("a friendly intro"), "beginner");
        assert_eq!(detect_technical_level(&"dns record ".repeat(3)), "intermediate");
        assert_eq!(detect_technical_level(&"dns policy protocol ".repeat(4)), "advanced");
    }

    #[tokio::test]
    async fn test_populate_once_then_noop() {
        let pool = init_memory_database().await.unwrap();
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("dmarc.md"), "# DMARC\n\nPublish a DMARC record.\n\nMove to reject.").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let corpus = corpus(pool, dir.path());

        let first = corpus.ensure_populated().await.unwrap();
        assert!(first.populated);
        assert_eq!(first.corpus_size, 1);

        let second = corpus.ensure_populated().await.unwrap();
        assert!(!second.populated);
        assert_eq!(second.corpus_size, 1);
    }

    #[tokio::test]
    async fn test_missing_directory_loads_sample() {
        let pool = init_memory_database().await.unwrap();
        let dir = TempDir::new().unwrap();
        let corpus = corpus(pool, &dir.path().join("absent"));

        let status = corpus.ensure_populated().await.unwrap();
        assert!(status.populated);

        let examples = corpus.retrieve_brand_examples("dmarc email authentication", 5).await.unwrap();
        assert_eq!(examples.len(), 1);
        assert_eq!(examples[0].metadata["document"], "sample.md");
        assert_eq!(examples[0].metadata["topic"], "dmarc");
    }

    #[tokio::test]
    async fn test_retrieval_ranks_by_similarity() {
        let pool = init_memory_database().await.unwrap();
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.md"), "Phishing emails trick staff into sharing passwords.").unwrap();
        std::fs::write(dir.path().join("b.md"), "DKIM signatures prove a message was not altered.").unwrap();
        let corpus = corpus(pool, dir.path());
        corpus.ensure_populated().await.unwrap();

        let examples = corpus.retrieve_brand_examples("DKIM signatures", 1).await.unwrap();
        assert_eq!(examples.len(), 1);
        assert_eq!(examples[0].metadata["document"], "b.md");
    }

    #[tokio::test]
    async fn test_empty_corpus_retrieves_nothing() {
        let pool = init_memory_database().await.unwrap();
        let dir = TempDir::new().unwrap();
        let corpus = corpus(pool, dir.path());
        assert!(corpus.retrieve_brand_examples("dmarc", 3).await.unwrap().is_empty());
    }
}
