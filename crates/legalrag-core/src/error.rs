use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A source file or directory could not be used. Ingestion reports it and
    /// moves on to the next file.
    #[error("Ingestion input error for {}: {reason}", path.display())]
    IngestionInput { path: PathBuf, reason: String },

    /// The provider returned a different number of vectors than texts submitted.
    #[error("Embedding count mismatch: submitted {texts} texts, provider returned {vectors} vectors")]
    EmbeddingCountMismatch { texts: usize, vectors: usize },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Collection '{collection}' was built with embedder '{stored}', not '{requested}'; rebuild the collection to switch models")]
    EmbedderMismatch { collection: String, stored: String, requested: String },

    #[error("Embedding provider error: {message}")]
    EmbeddingProvider { message: String, retryable: bool },

    #[error("Language model error: {message}")]
    LanguageModel { message: String, retryable: bool },

    #[error("Vector store error: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when the caller may retry the same request later (timeouts,
    /// connection failures, rate limits, upstream 5xx).
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::EmbeddingProvider { retryable, .. } | Error::LanguageModel { retryable, .. } => *retryable,
            _ => false,
        }
    }

    pub fn store<E: std::fmt::Display>(e: E) -> Self {
        Error::Store(e.to_string())
    }
}

/// HTTP statuses worth retrying: rate limiting and upstream failures.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_provider_failures_are_retryable() {
        let e = Error::EmbeddingProvider { message: "timed out".into(), retryable: true };
        assert!(e.is_retryable());
        let e = Error::LanguageModel { message: "401".into(), retryable: false };
        assert!(!e.is_retryable());
        assert!(!Error::EmbeddingCountMismatch { texts: 2, vectors: 1 }.is_retryable());
    }

    #[test]
    fn rate_limits_and_server_errors_are_retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(401));
        assert!(!is_retryable_status(200));
    }
}
