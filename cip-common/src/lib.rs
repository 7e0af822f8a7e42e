//! # CIP Common Library
//!
//! Shared code for the content intelligence pipeline including:
//! - Error types
//! - Root folder and configuration file resolution
//! - Database initialization (pipelines, stage outputs, audit log, brand corpus)
//! - Timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
