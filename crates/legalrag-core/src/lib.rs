//! legalrag-core
//!
//! Shared domain types, the error taxonomy, provider traits, configuration,
//! and the document-to-chunk path (cleaning, splitting, loading) used by the
//! ingestion and retrieval crates.

pub mod cleaner;
pub mod config;
pub mod data_processor;
pub mod error;
pub mod metrics;
pub mod splitter;
pub mod traits;
pub mod types;

pub use error::{is_retryable_status, Error, Result};
