//! Entry-tag association repository.
//!
//! # Responsibility
//! - Persist weighted entry↔tag links.
//! - Read back the tags of one entry.
//!
//! # Invariants
//! - At most one row per `(entry_id, tag_id)`; re-linking replaces the
//!   confidence in place.
//! - Confidence is a finite value in `[0.0, 1.0]`.
//! - Links disappear with either endpoint (`ON DELETE CASCADE`).

use crate::model::entry::EntryId;
use crate::model::tag::{Tag, TagId, TagLink};
use crate::repo::entry_repo::{entry_exists, load_tags_for_entry, RepoError, RepoResult};
use crate::repo::retry::with_conflict_retry;
use crate::repo::tag_repo::{parse_tag_row, tag_exists};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};

/// Repository interface for entry-tag links.
pub trait LinkRepository {
    /// Upserts the link, replacing the confidence when it already exists.
    fn link_entry_tag(&self, entry_id: EntryId, tag_id: TagId, confidence: f64)
        -> RepoResult<()>;
    /// Tags currently linked to the entry, ordered by name then id.
    fn tags_of(&self, entry_id: EntryId) -> RepoResult<Vec<Tag>>;
    /// Tags of the entry with their confidence, ordered like [`Self::tags_of`].
    fn tag_links_of(&self, entry_id: EntryId) -> RepoResult<Vec<TagLink>>;
}

/// SQLite-backed link repository.
pub struct SqliteLinkRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLinkRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl LinkRepository for SqliteLinkRepository<'_> {
    fn link_entry_tag(
        &self,
        entry_id: EntryId,
        tag_id: TagId,
        confidence: f64,
    ) -> RepoResult<()> {
        validate_confidence(confidence)?;

        with_conflict_retry("entry_tag_link", || {
            let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
            if !entry_exists(&tx, entry_id)? {
                return Err(RepoError::EntryNotFound(entry_id));
            }
            if !tag_exists(&tx, tag_id)? {
                return Err(RepoError::TagNotFound(tag_id));
            }

            tx.execute(
                "INSERT INTO entry_tags (entry_id, tag_id, confidence)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(entry_id, tag_id) DO UPDATE SET confidence = excluded.confidence;",
                params![entry_id.to_string(), tag_id.to_string(), confidence],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    fn tags_of(&self, entry_id: EntryId) -> RepoResult<Vec<Tag>> {
        load_tags_for_entry(self.conn, entry_id)
    }

    fn tag_links_of(&self, entry_id: EntryId) -> RepoResult<Vec<TagLink>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                t.id AS id,
                t.name AS name,
                t.parent_id AS parent_id,
                t.created_at AS created_at,
                et.confidence AS confidence
             FROM entry_tags et
             INNER JOIN tags t ON t.id = et.tag_id
             WHERE et.entry_id = ?1
             ORDER BY t.name ASC, t.id ASC;",
        )?;
        let mut rows = stmt.query([entry_id.to_string()])?;
        let mut links = Vec::new();
        while let Some(row) = rows.next()? {
            links.push(TagLink {
                tag: parse_tag_row(row)?,
                confidence: row.get("confidence")?,
            });
        }
        Ok(links)
    }
}

fn validate_confidence(confidence: f64) -> RepoResult<()> {
    if confidence.is_finite() && (0.0..=1.0).contains(&confidence) {
        return Ok(());
    }
    Err(RepoError::InvalidInput(format!(
        "confidence must be within [0, 1], got {confidence}"
    )))
}

#[cfg(test)]
mod tests {
    use super::validate_confidence;

    #[test]
    fn confidence_bounds_are_inclusive() {
        assert!(validate_confidence(0.0).is_ok());
        assert!(validate_confidence(1.0).is_ok());
        assert!(validate_confidence(1.01).is_err());
        assert!(validate_confidence(-0.1).is_err());
        assert!(validate_confidence(f64::NAN).is_err());
    }
}
