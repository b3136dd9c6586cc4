//! Caller-facing error classification.
//!
//! Each layer keeps its own error enum; this module maps them onto the
//! small set of kinds that consumers (CLI, future transports) branch on.

use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Coarse error category shared across all core operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Empty content, malformed parameters. Never retried.
    InvalidInput,
    /// Unknown entry or tag id.
    NotFound,
    /// A write kept colliding with concurrent writers after bounded retries.
    ConflictRetryable,
    /// The store is unreachable, corrupt or holds undecodable rows.
    StorageUnavailable,
    /// The classifier failed or timed out. Informational only.
    ClassificationUnavailable,
    /// The embedder failed or timed out. Informational only.
    EmbeddingUnavailable,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::NotFound => "not_found",
            Self::ConflictRetryable => "conflict_retryable",
            Self::StorageUnavailable => "storage_unavailable",
            Self::ClassificationUnavailable => "classification_unavailable",
            Self::EmbeddingUnavailable => "embedding_unavailable",
        }
    }

    /// Whether a request carrying this error still produced its primary result.
    pub const fn is_degradation(self) -> bool {
        matches!(
            self,
            Self::ClassificationUnavailable | Self::EmbeddingUnavailable
        )
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
