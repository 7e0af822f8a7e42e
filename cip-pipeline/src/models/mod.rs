//! Data models for the content pipeline
//!
//! - Pipeline record and status state machine
//! - Stage numbering and persisted stage outputs
//! - Audit events
//! - Typed per-stage payloads

pub mod audit;
pub mod payloads;
pub mod pipeline;
pub mod stage;

pub use audit::{AuditEvent, AuditEventType};
pub use payloads::{
    AnalysisOutput, BrandExample, Claim, ContentAnalysis, ContentBrief, DraftMetadata, DraftOutput,
    ExtractionOutput, FormatOutput, GapAnalysis, HtmlValidation, InternalLink, KeywordSet, Outline,
    OutlineOutput, OutlineSection, QaOutput, RagSetupOutput, SafetyOutput,
};
pub use pipeline::{PipelineRecord, PipelineStatus, StatusTransition};
pub use stage::{Stage, StageOutputRecord};
