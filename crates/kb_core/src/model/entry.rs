//! Entry domain model.
//!
//! # Responsibility
//! - Define the captured-text record and its read projections.
//! - Validate content before it reaches storage.
//!
//! # Invariants
//! - `id` is stable and never reused for another entry.
//! - `content` is non-blank and never mutated in place.
//! - `last_viewed_at` is `None` until the entry is opened for the first time.

use crate::model::tag::Tag;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a captured entry.
pub type EntryId = Uuid;

/// One captured piece of text content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    /// Raw text as captured. Never empty after trimming.
    pub content: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds of the last time the entry was opened.
    pub last_viewed_at: Option<i64>,
    /// Linked tags ordered by name. Filled by read paths.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

impl Entry {
    /// Builds a fresh entry with a generated id and no tags.
    pub fn new(content: impl Into<String>, created_at: i64) -> Result<Self, EntryValidationError> {
        let content = content.into();
        validate_content(&content)?;
        Ok(Self {
            id: Uuid::new_v4(),
            content,
            created_at,
            last_viewed_at: None,
            tags: Vec::new(),
        })
    }

    /// Whether the entry has never been surfaced to the user.
    pub fn never_viewed(&self) -> bool {
        self.last_viewed_at.is_none()
    }
}

/// Validation failures for entry content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryValidationError {
    EmptyContent,
}

impl Display for EntryValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyContent => write!(f, "entry content must not be empty"),
        }
    }
}

impl Error for EntryValidationError {}

/// Rejects empty and whitespace-only content.
pub fn validate_content(content: &str) -> Result<(), EntryValidationError> {
    if content.trim().is_empty() {
        return Err(EntryValidationError::EmptyContent);
    }
    Ok(())
}
