//! Retry helpers for storage and external calls

pub mod backoff;
pub mod db_retry;

pub use backoff::{retry_transient, BackoffPolicy};
pub use db_retry::retry_on_lock;
