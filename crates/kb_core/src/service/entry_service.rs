//! Entry use-case service.
//!
//! # Responsibility
//! - Turn "absent" repository reads into `EntryNotFound`.
//! - Provide the open-and-touch read used when a user views an entry.

use crate::model::entry::{Entry, EntryId};
use crate::model::tag::TagId;
use crate::repo::entry_repo::{EntryListQuery, EntryRepository, RepoError, RepoResult};

/// Entry service facade over repository implementations.
pub struct EntryService<R: EntryRepository> {
    repo: R,
}

impl<R: EntryRepository> EntryService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn create_entry(&self, content: &str) -> RepoResult<Entry> {
        self.repo.create_entry(content)
    }

    /// Loads one entry with its tags; unknown ids are `EntryNotFound`.
    pub fn get_entry(&self, id: EntryId) -> RepoResult<Entry> {
        self.repo
            .get_entry(id)?
            .ok_or(RepoError::EntryNotFound(id))
    }

    /// Loads one entry and records that it was viewed.
    pub fn open_entry(&self, id: EntryId) -> RepoResult<Entry> {
        let viewed_at = self.repo.touch_viewed(id)?;
        let mut entry = self.get_entry(id)?;
        entry.last_viewed_at = Some(viewed_at);
        Ok(entry)
    }

    pub fn list_entries(&self, query: &EntryListQuery) -> RepoResult<Vec<Entry>> {
        self.repo.list_entries(query)
    }

    pub fn list_entries_by_tag(
        &self,
        tag_id: TagId,
        include_descendants: bool,
    ) -> RepoResult<Vec<Entry>> {
        self.repo.list_entries_by_tag(tag_id, include_descendants)
    }

    pub fn list_entries_by_tag_page(
        &self,
        tag_id: TagId,
        include_descendants: bool,
        query: &EntryListQuery,
    ) -> RepoResult<Vec<Entry>> {
        self.repo
            .list_entries_by_tag_page(tag_id, include_descendants, query)
    }

    pub fn search_entries(&self, needle: &str) -> RepoResult<Vec<Entry>> {
        self.repo.search_entries(needle)
    }

    pub fn delete_entry(&self, id: EntryId) -> RepoResult<()> {
        self.repo.delete_entry(id)
    }

    pub fn touch_viewed(&self, id: EntryId) -> RepoResult<i64> {
        self.repo.touch_viewed(id)
    }
}
