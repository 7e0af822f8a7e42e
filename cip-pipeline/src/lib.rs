//! cip-pipeline library
//!
//! Content intelligence pipeline: turns a competitor article URL into an
//! original, brand-aligned, SEO-scored article through eight stages, with
//! safety and quality gates and a human review workflow.
//!
//! Entry points:
//! - [`workflow::Orchestrator`]: run pipelines, regenerate, query state
//! - [`workflow::ReviewWorkflow`]: approve, reject, request changes
//! - [`services::default_collaborators`]: production collaborator wiring

pub mod artifacts;
pub mod config;
pub mod db;
pub mod error;
pub mod gates;
pub mod models;
pub mod services;
pub mod stages;
pub mod text;
pub mod types;
pub mod utils;
pub mod workflow;

pub use crate::error::{PipelineError, PipelineResult};
pub use crate::workflow::{Orchestrator, PipelineEvent, RegenerationOutcome, ReviewWorkflow};
