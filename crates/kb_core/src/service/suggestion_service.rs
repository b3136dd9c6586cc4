//! Staleness-driven resurfacing.
//!
//! # Invariants
//! - Both operations order by `last_viewed_at ASC` with never-viewed
//!   entries first, then `created_at DESC, id ASC`.
//! - `similar_by_tags` never returns the anchor entry and never repeats one.
//! - A limit of `0` yields an empty result.

use crate::model::entry::{Entry, EntryId};
use crate::repo::entry_repo::{EntryRepository, RepoResult};

pub const DEFAULT_SUGGESTION_LIMIT: u32 = 5;

/// Suggestion service facade over an entry repository.
pub struct SuggestionService<R: EntryRepository> {
    repo: R,
}

impl<R: EntryRepository> SuggestionService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Entries the user has looked at least recently.
    pub fn suggest(&self, limit: u32) -> RepoResult<Vec<Entry>> {
        self.repo.list_stale(limit)
    }

    /// Stale entries sharing at least one tag with `entry_id`.
    pub fn similar_by_tags(&self, entry_id: EntryId, limit: u32) -> RepoResult<Vec<Entry>> {
        self.repo.list_sharing_tags(entry_id, limit)
    }
}
