//! Deterministic feature-hashing embedder
//!
//! Each lowercase token (and each adjacent token pair) is hashed with SHA-256
//! into one of `dims` buckets with a hash-derived sign; the vector is then
//! L2-normalised. Identical text always yields identical vectors, and texts
//! sharing vocabulary score high cosine similarity.

use crate::types::{CollaboratorResult, Embedder};
use sha2::{Digest, Sha256};

pub const DEFAULT_DIMENSIONS: usize = 384;

/// Bigram features weigh less than single tokens
const BIGRAM_WEIGHT: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dims: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    pub fn dimensions(&self) -> usize {
        self.dims
    }

    /// Embed one text
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let tokens: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect();

        let mut vector = vec![0.0f32; self.dims];
        for token in &tokens {
            self.add_feature(&mut vector, token.as_bytes(), 1.0);
        }
        for pair in tokens.windows(2) {
            let feature = format!("{} {}", pair[0], pair[1]);
            self.add_feature(&mut vector, feature.as_bytes(), BIGRAM_WEIGHT);
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }

    fn add_feature(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let digest = Sha256::digest(feature);
        let mut index_bytes = [0u8; 8];
        index_bytes.copy_from_slice(&digest[..8]);
        let index = (u64::from_le_bytes(index_bytes) % self.dims as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[index] += sign * weight;
    }
}

#[async_trait::async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, chunks: &[String]) -> CollaboratorResult<Vec<Vec<f32>>> {
        Ok(chunks.iter().map(|chunk| self.embed_text(chunk)).collect())
    }
}
