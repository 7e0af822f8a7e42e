//! Plagiarism check
//!
//! Compares embeddings of the draft's chunks against the source fingerprint. The
//! score for each draft chunk is its best cosine match against any source chunk;
//! the overall score is the maximum over draft chunks.

use crate::text::truncate_chars;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Draft chunk at or above the threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedChunk {
    pub chunk_index: usize,
    pub similarity: f64,
    pub content_preview: String,
}

/// Plagiarism check outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlagiarismResult {
    pub max_similarity: f64,
    pub avg_similarity: f64,
    pub flagged_chunks: Vec<FlaggedChunk>,
    pub passed: bool,
    pub threshold: f64,
    /// False when no source fingerprint was available to compare against
    pub fingerprint_available: bool,
}

/// Cosine similarity; zero vectors and length mismatches score 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Compare draft chunk embeddings to the source fingerprint.
///
/// Without a fingerprint the check passes with zero similarity.
pub fn check_plagiarism(
    draft_chunks: &[String],
    draft_embeddings: &[Vec<f32>],
    fingerprint: Option<&[Vec<f32>]>,
    threshold: f64,
) -> PlagiarismResult {
    let fingerprint = match fingerprint {
        Some(vectors) if !vectors.is_empty() => vectors,
        _ => {
            warn!("No source fingerprint found; plagiarism check skipped");
            return PlagiarismResult {
                max_similarity: 0.0,
                avg_similarity: 0.0,
                flagged_chunks: Vec::new(),
                passed: true,
                threshold,
                fingerprint_available: false,
            };
        }
    };

    let per_chunk: Vec<f64> = draft_embeddings
        .iter()
        .map(|vector| {
            fingerprint
                .iter()
                .map(|source| cosine_similarity(vector, source))
                .fold(0.0f64, f64::max)
        })
        .collect();

    let flagged_chunks: Vec<FlaggedChunk> = per_chunk
        .iter()
        .enumerate()
        .filter(|(_, similarity)| **similarity >= threshold)
        .map(|(index, similarity)| FlaggedChunk {
            chunk_index: index,
            similarity: *similarity,
            content_preview: format!(
                "{}...",
                truncate_chars(draft_chunks.get(index).map(String::as_str).unwrap_or(""), 200)
            ),
        })
        .collect();

    let max_similarity = per_chunk.iter().copied().fold(0.0f64, f64::max);
    let avg_similarity = if per_chunk.is_empty() {
        0.0
    } else {
        per_chunk.iter().sum::<f64>() / per_chunk.len() as f64
    };
    let passed = max_similarity < threshold;

    if passed {
        info!(max_similarity, "Plagiarism check passed");
    } else {
        warn!(
            max_similarity,
            threshold,
            flagged = flagged_chunks.len(),
            "Plagiarism similarity exceeds threshold"
        );
    }

    PlagiarismResult {
        max_similarity,
        avg_similarity,
        flagged_chunks,
        passed,
        threshold,
        fingerprint_available: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("chunk {}", i)).collect()
    }

    #[test]
    fn test_cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-12);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-12);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_max_over_draft_and_source_chunks() {
        // Second draft chunk matches the second source chunk at cos = 0.9
        let source = vec![vec![0.0, 1.0, 0.0], vec![1.0, 0.0, 0.0]];
        let draft = vec![vec![0.0, 0.0, 1.0], vec![0.9, 0.0, 0.43588989]];
        let result = check_plagiarism(&chunks(2), &draft, Some(&source), 0.85);

        assert!((result.max_similarity - 0.9).abs() < 1e-6);
        assert!(!result.passed);
        assert_eq!(result.flagged_chunks.len(), 1);
        assert_eq!(result.flagged_chunks[0].chunk_index, 1);
        assert!(result.flagged_chunks[0].content_preview.starts_with("chunk 1"));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let source = vec![vec![1.0, 0.0]];
        let draft = vec![vec![1.0, 0.0]];
        let result = check_plagiarism(&chunks(1), &draft, Some(&source), 1.0);
        assert!(!result.passed);
        assert_eq!(result.flagged_chunks.len(), 1);
    }

    #[test]
    fn test_low_similarity_passes_with_average() {
        let source = vec![vec![1.0, 0.0]];
        let draft = vec![vec![0.1, 0.99498744], vec![0.0, 1.0]];
        let result = check_plagiarism(&chunks(2), &draft, Some(&source), 0.85);
        assert!(result.passed);
        assert!((result.max_similarity - 0.1).abs() < 1e-6);
        assert!((result.avg_similarity - 0.05).abs() < 1e-6);
        assert!(result.flagged_chunks.is_empty());
    }

    #[test]
    fn test_missing_fingerprint_passes() {
        let result = check_plagiarism(&chunks(1), &[vec![1.0]], None, 0.85);
        assert!(result.passed);
        assert_eq!(result.max_similarity, 0.0);
        assert!(!result.fingerprint_available);
    }

    #[test]
    fn test_preview_is_truncated() {
        let long_chunk = vec!["x".repeat(500)];
        let source = vec![vec![1.0, 0.0]];
        let result = check_plagiarism(&long_chunk, &[vec![1.0, 0.0]], Some(&source), 0.85);
        assert_eq!(result.flagged_chunks[0].content_preview.len(), 203);
    }

    #[test]
    fn test_deterministic_for_same_inputs() {
        let source = vec![vec![0.3, 0.7, 0.1], vec![0.5, 0.5, 0.5]];
        let draft = vec![vec![0.2, 0.9, 0.0]];
        let a = check_plagiarism(&chunks(1), &draft, Some(&source), 0.85);
        let b = check_plagiarism(&chunks(1), &draft, Some(&source), 0.85);
        assert_eq!(a, b);
    }
}
