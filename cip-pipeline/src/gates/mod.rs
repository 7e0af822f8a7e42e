//! Decision gates
//!
//! Both gates are deterministic functions of their inputs and configuration:
//! - Safety gate: copyright risk and sensitive-topic screening of the source
//! - Quality gate: plagiarism, SEO, readability and fact-check screening of the draft

pub mod plagiarism;
pub mod quality;
pub mod safety;
pub mod seo;

pub use plagiarism::{check_plagiarism, cosine_similarity, FlaggedChunk, PlagiarismResult};
pub use quality::{QualityGate, QualityReport, QualityScores, QualityStatus};
pub use safety::{RiskLevel, SafetyDecision, SafetyGate};
pub use seo::{score_seo, ComponentScores, SeoAnalysis, SeoMetrics};
