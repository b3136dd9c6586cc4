//! Capture orchestration.
//!
//! # Responsibility
//! - Persist a new entry, then enrich it with classifier tags and an
//!   embedding on a best-effort basis.
//! - Report every enrichment failure as a [`Degradation`] instead of an
//!   error.
//!
//! # Invariants
//! - Once the entry insert commits, `capture` returns `Ok`; the entry is
//!   never rolled back because a later step failed.
//! - Tag names are canonicalized before they reach the catalogue.
//! - The new entry never appears among its own similar entries.

use crate::error::ErrorKind;
use crate::model::entry::Entry;
use crate::model::tag::{canonical_tag_name, Tag};
use crate::provider::spi::{Classifier, Embedder, TagSuggestion};
use crate::repo::embedding_repo::{EmbeddingRepository, SqliteEmbeddingRepository};
use crate::repo::entry_repo::{EntryRepository, RepoError, RepoResult, SqliteEntryRepository};
use crate::repo::link_repo::{LinkRepository, SqliteLinkRepository};
use crate::repo::tag_repo::{SqliteTagRepository, TagRepository};
use crate::search::similarity::{find_similar, SimilarEntry, SimilarityQuery};
use crate::service::suggestion_service::DEFAULT_SUGGESTION_LIMIT;
use log::{debug, info, warn};
use rusqlite::Connection;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Per-call switches for the enrichment steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOptions {
    pub classify: bool,
    pub embed: bool,
    /// Maximum similar entries to report. `0` skips the similarity query.
    pub similar_limit: u32,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            classify: true,
            embed: true,
            similar_limit: DEFAULT_SUGGESTION_LIMIT,
        }
    }
}

/// Enrichment step a degradation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureStep {
    Classify,
    Tag,
    Embed,
    StoreEmbedding,
    FindSimilar,
    Reload,
}

impl CaptureStep {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Classify => "classify",
            Self::Tag => "tag",
            Self::Embed => "embed",
            Self::StoreEmbedding => "store_embedding",
            Self::FindSimilar => "find_similar",
            Self::Reload => "reload",
        }
    }
}

/// A non-fatal failure observed after the entry was stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Degradation {
    pub step: CaptureStep,
    pub kind: ErrorKind,
    pub reason: String,
}

impl Degradation {
    fn new(step: CaptureStep, kind: ErrorKind, reason: impl Into<String>) -> Self {
        Self {
            step,
            kind,
            reason: reason.into(),
        }
    }
}

/// A classifier suggestion as it was applied to the entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedTag {
    pub tag: Tag,
    /// Name of the tag's parent in the catalogue, which may differ from the
    /// suggested parent when the tag already existed.
    pub parent: Option<String>,
    pub confidence: f64,
}

/// Outcome of one capture.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureReport {
    /// The stored entry, re-read with its tags.
    pub entry: Entry,
    pub applied_tags: Vec<AppliedTag>,
    pub similar: Vec<SimilarEntry>,
    pub degradations: Vec<Degradation>,
}

impl CaptureReport {
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

/// Capture failure before the entry was stored.
#[derive(Debug)]
pub enum CaptureServiceError {
    Create(RepoError),
}

impl CaptureServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Create(err) => err.kind(),
        }
    }
}

impl Display for CaptureServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create(err) => write!(f, "failed to store entry: {err}"),
        }
    }
}

impl Error for CaptureServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Create(err) => Some(err),
        }
    }
}

/// Capture service bound to one connection and optional collaborators.
pub struct CaptureService<'a> {
    conn: &'a Connection,
    classifier: Option<&'a dyn Classifier>,
    embedder: Option<&'a dyn Embedder>,
}

impl<'a> CaptureService<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            classifier: None,
            embedder: None,
        }
    }

    pub fn with_classifier(mut self, classifier: &'a dyn Classifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_embedder(mut self, embedder: &'a dyn Embedder) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Stores `content` as a new entry and runs the enabled enrichment steps.
    pub fn capture(
        &self,
        content: &str,
        options: &CaptureOptions,
    ) -> Result<CaptureReport, CaptureServiceError> {
        let entries = SqliteEntryRepository::new(self.conn);
        let entry = entries
            .create_entry(content)
            .map_err(CaptureServiceError::Create)?;

        let mut degradations = Vec::new();
        let mut applied_tags = Vec::new();
        let mut similar = Vec::new();

        if options.classify {
            if let Some(classifier) = self.classifier {
                applied_tags = self.classify_and_tag(classifier, &entry, &mut degradations);
            }
        }
        if options.embed {
            if let Some(embedder) = self.embedder {
                similar = self.embed_and_rank(embedder, &entry, options, &mut degradations);
            }
        }

        let entry = match entries.get_entry(entry.id) {
            Ok(Some(reloaded)) => reloaded,
            Ok(None) => {
                degradations.push(Degradation::new(
                    CaptureStep::Reload,
                    ErrorKind::NotFound,
                    "entry disappeared before it could be re-read",
                ));
                entry
            }
            Err(err) => {
                degradations.push(Degradation::new(
                    CaptureStep::Reload,
                    err.kind(),
                    err.to_string(),
                ));
                entry
            }
        };

        let status = if degradations.is_empty() {
            "ok"
        } else {
            "degraded"
        };
        info!(
            "event=entry_capture module=service status={status} tags={} similar={} degradations={}",
            applied_tags.len(),
            similar.len(),
            degradations.len()
        );

        Ok(CaptureReport {
            entry,
            applied_tags,
            similar,
            degradations,
        })
    }

    fn classify_and_tag(
        &self,
        classifier: &dyn Classifier,
        entry: &Entry,
        degradations: &mut Vec<Degradation>,
    ) -> Vec<AppliedTag> {
        let tags = SqliteTagRepository::new(self.conn);
        let known_tags: Vec<String> = match tags.list_tags() {
            Ok(catalogue) => catalogue.into_iter().map(|tag| tag.name).collect(),
            Err(err) => {
                warn!("event=entry_capture module=service status=degraded step=tag error={err}");
                degradations.push(Degradation::new(CaptureStep::Tag, err.kind(), err.to_string()));
                return Vec::new();
            }
        };

        let suggestions = match classifier.classify(&entry.content, &known_tags) {
            Ok(suggestions) => suggestions,
            Err(err) => {
                warn!(
                    "event=entry_capture module=service status=degraded step=classify error={err}"
                );
                degradations.push(Degradation::new(
                    CaptureStep::Classify,
                    ErrorKind::ClassificationUnavailable,
                    err.to_string(),
                ));
                return Vec::new();
            }
        };

        let links = SqliteLinkRepository::new(self.conn);
        let mut applied: Vec<AppliedTag> = Vec::with_capacity(suggestions.len());
        for suggestion in &suggestions {
            match apply_suggestion(&tags, &links, entry, suggestion) {
                // Repeated names upsert the same link; the report keeps the latest write.
                Ok(Some(tag)) => match applied
                    .iter_mut()
                    .find(|existing| existing.tag.id == tag.tag.id)
                {
                    Some(existing) => *existing = tag,
                    None => applied.push(tag),
                },
                Ok(None) => {
                    debug!("event=entry_capture module=service status=skip reason=blank_tag_name");
                }
                Err(err) => {
                    warn!("event=entry_capture module=service status=degraded step=tag error={err}");
                    degradations.push(Degradation::new(
                        CaptureStep::Tag,
                        err.kind(),
                        err.to_string(),
                    ));
                }
            }
        }
        applied
    }

    fn embed_and_rank(
        &self,
        embedder: &dyn Embedder,
        entry: &Entry,
        options: &CaptureOptions,
        degradations: &mut Vec<Degradation>,
    ) -> Vec<SimilarEntry> {
        let vector = match embedder.embed(&entry.content) {
            Ok(vector) => vector,
            Err(err) => {
                warn!("event=entry_capture module=service status=degraded step=embed error={err}");
                degradations.push(Degradation::new(
                    CaptureStep::Embed,
                    ErrorKind::EmbeddingUnavailable,
                    err.to_string(),
                ));
                return Vec::new();
            }
        };

        let embeddings = SqliteEmbeddingRepository::new(self.conn);
        if let Err(err) = embeddings.save_embedding(entry.id, &vector, embedder.model()) {
            warn!(
                "event=entry_capture module=service status=degraded step=store_embedding error={err}"
            );
            degradations.push(Degradation::new(
                CaptureStep::StoreEmbedding,
                err.kind(),
                err.to_string(),
            ));
        }

        let query = SimilarityQuery::new(vector, options.similar_limit).excluding(entry.id);
        match find_similar(self.conn, &query) {
            Ok(hits) => hits,
            Err(err) => {
                warn!(
                    "event=entry_capture module=service status=degraded step=find_similar error={err}"
                );
                degradations.push(Degradation::new(
                    CaptureStep::FindSimilar,
                    err.kind(),
                    err.to_string(),
                ));
                Vec::new()
            }
        }
    }
}

/// Applies one suggestion; `Ok(None)` when its name canonicalizes to nothing.
fn apply_suggestion(
    tags: &impl TagRepository,
    links: &impl LinkRepository,
    entry: &Entry,
    suggestion: &TagSuggestion,
) -> RepoResult<Option<AppliedTag>> {
    let Some(name) = canonical_tag_name(&suggestion.name) else {
        return Ok(None);
    };
    let parent_name = suggestion
        .parent
        .as_deref()
        .and_then(canonical_tag_name)
        .filter(|parent| *parent != name);

    let suggested_parent = match parent_name {
        Some(parent_name) => Some(tags.get_or_create_tag(&parent_name, None)?),
        None => None,
    };
    let tag = tags.get_or_create_tag(&name, suggested_parent.as_ref().map(|parent| parent.id))?;

    let confidence = clamp_confidence(suggestion.confidence);
    links.link_entry_tag(entry.id, tag.id, confidence)?;

    let parent = match (tag.parent_id, suggested_parent) {
        (None, _) => None,
        (Some(parent_id), Some(suggested)) if suggested.id == parent_id => Some(suggested.name),
        (Some(parent_id), _) => tags.get_tag(parent_id)?.map(|parent| parent.name),
    };

    Ok(Some(AppliedTag {
        tag,
        parent,
        confidence,
    }))
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::clamp_confidence;

    #[test]
    fn confidence_is_clamped_into_unit_interval() {
        assert_eq!(clamp_confidence(1.7), 1.0);
        assert_eq!(clamp_confidence(-0.2), 0.0);
        assert_eq!(clamp_confidence(0.42), 0.42);
        assert_eq!(clamp_confidence(f64::NAN), 0.0);
        assert_eq!(clamp_confidence(f64::INFINITY), 0.0);
    }
}
