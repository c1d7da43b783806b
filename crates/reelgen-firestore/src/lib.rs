//! Firestore REST API client.
//!
//! This crate provides:
//! - Document reads used by the plan/usage lookup
//! - Service account authentication via gcp_auth
//! - Retry with exponential backoff
//! - Request metrics

pub mod client;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod token_cache;
pub mod types;

pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use retry::RetryConfig;
pub use types::{Document, FromFirestoreValue, Value};
