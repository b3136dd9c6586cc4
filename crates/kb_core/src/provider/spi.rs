//! Classifier and embedder SPI.
//!
//! # Invariants
//! - Implementations bound every call with their own timeout and report
//!   expiry as [`ProviderErrorKind::Timeout`].
//! - Implementations never panic across this boundary.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One tag proposed by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagSuggestion {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Expected within `[0, 1]`; callers clamp before persisting.
    pub confidence: f64,
}

impl TagSuggestion {
    pub fn new(name: impl Into<String>, parent: Option<&str>, confidence: f64) -> Self {
        Self {
            name: name.into(),
            parent: parent.map(str::to_string),
            confidence,
        }
    }
}

/// Failure category of a collaborator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    MissingCredentials,
    Timeout,
    Transport,
    HttpStatus(u16),
    MalformedResponse,
}

/// Collaborator failure. Never fatal to entry capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub provider: &'static str,
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(provider: &'static str, kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            provider,
            kind,
            message: message.into(),
        }
    }

    pub fn malformed(provider: &'static str, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::MalformedResponse, message)
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ProviderErrorKind::MissingCredentials => {
                write!(f, "{} credentials missing: {}", self.provider, self.message)
            }
            ProviderErrorKind::Timeout => write!(f, "{} timed out: {}", self.provider, self.message),
            ProviderErrorKind::Transport => {
                write!(f, "{} request failed: {}", self.provider, self.message)
            }
            ProviderErrorKind::HttpStatus(status) => write!(
                f,
                "{} returned status {status}: {}",
                self.provider, self.message
            ),
            ProviderErrorKind::MalformedResponse => {
                write!(f, "{} returned malformed response: {}", self.provider, self.message)
            }
        }
    }
}

impl Error for ProviderError {}

/// Proposes tags for entry content.
pub trait Classifier: Send + Sync {
    /// Classifies `content`, preferring names from `known_tags` when they fit.
    fn classify(
        &self,
        content: &str,
        known_tags: &[String],
    ) -> Result<Vec<TagSuggestion>, ProviderError>;
}

/// Produces embedding vectors for text.
pub trait Embedder: Send + Sync {
    /// Model name recorded alongside stored vectors.
    fn model(&self) -> &str;
    fn embed(&self, text: &str) -> Result<Vec<f64>, ProviderError>;
}
