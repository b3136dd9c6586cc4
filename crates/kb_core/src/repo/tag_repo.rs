//! Tag catalogue repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Deduplicate tags by name with get-or-create semantics.
//! - Keep the parent relation acyclic on every write this crate performs.
//!
//! # Invariants
//! - `get_or_create_tag` never surfaces a uniqueness violation: racing
//!   callers converge on the row that won the insert.
//! - An existing tag keeps its parent; get-or-create never re-parents.
//! - `set_tag_parent` rejects a parent that is the tag itself or one of its
//!   descendants.

use crate::db::now_epoch_ms;
use crate::model::tag::{Tag, TagId};
use crate::repo::entry_repo::{parse_uuid, RepoError, RepoResult};
use crate::repo::retry::with_conflict_retry;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const TAG_SELECT_SQL: &str = "SELECT id, name, parent_id, created_at FROM tags";

/// Repository interface for the tag hierarchy.
pub trait TagRepository {
    /// Returns the tag named `name`, creating it under `parent_id` when absent.
    fn get_or_create_tag(&self, name: &str, parent_id: Option<TagId>) -> RepoResult<Tag>;
    /// Loads one tag by id.
    fn get_tag(&self, id: TagId) -> RepoResult<Option<Tag>>;
    /// Loads one tag by exact (trimmed) name.
    fn find_tag_by_name(&self, name: &str) -> RepoResult<Option<Tag>>;
    /// Returns all tags sorted by name.
    fn list_tags(&self) -> RepoResult<Vec<Tag>>;
    /// Re-parents one tag, or detaches it when `parent_id` is `None`.
    fn set_tag_parent(&self, id: TagId, parent_id: Option<TagId>) -> RepoResult<()>;
}

/// SQLite-backed tag repository.
pub struct SqliteTagRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTagRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl TagRepository for SqliteTagRepository<'_> {
    fn get_or_create_tag(&self, name: &str, parent_id: Option<TagId>) -> RepoResult<Tag> {
        let name = normalize_lookup_name(name)?;
        if let Some(existing) = load_tag_by_name(self.conn, name)? {
            return Ok(existing);
        }

        with_conflict_retry("tag_get_or_create", || {
            let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
            if let Some(existing) = load_tag_by_name(&tx, name)? {
                return Ok(existing);
            }
            if let Some(parent_id) = parent_id {
                if !tag_exists(&tx, parent_id)? {
                    return Err(RepoError::TagNotFound(parent_id));
                }
            }

            let inserted = tx.execute(
                "INSERT INTO tags (id, name, parent_id, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(name) DO NOTHING;",
                params![
                    Uuid::new_v4().to_string(),
                    name,
                    parent_id.map(|value| value.to_string()),
                    now_epoch_ms(),
                ],
            )?;
            let tag = load_tag_by_name(&tx, name)?.ok_or_else(|| {
                RepoError::InvalidData(format!("tag `{name}` missing after upsert"))
            })?;
            tx.commit()?;

            if inserted == 1 {
                debug!(
                    "event=tag_create module=repo status=ok has_parent={}",
                    tag.parent_id.is_some()
                );
            }
            Ok(tag)
        })
    }

    fn get_tag(&self, id: TagId) -> RepoResult<Option<Tag>> {
        let mut stmt = self.conn.prepare(&format!("{TAG_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_tag_row(row)?));
        }
        Ok(None)
    }

    fn find_tag_by_name(&self, name: &str) -> RepoResult<Option<Tag>> {
        let name = normalize_lookup_name(name)?;
        load_tag_by_name(self.conn, name)
    }

    fn list_tags(&self) -> RepoResult<Vec<Tag>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TAG_SELECT_SQL} ORDER BY name ASC, id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            tags.push(parse_tag_row(row)?);
        }
        Ok(tags)
    }

    fn set_tag_parent(&self, id: TagId, parent_id: Option<TagId>) -> RepoResult<()> {
        with_conflict_retry("tag_set_parent", || {
            let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
            if !tag_exists(&tx, id)? {
                return Err(RepoError::TagNotFound(id));
            }
            if let Some(parent_id) = parent_id {
                if !tag_exists(&tx, parent_id)? {
                    return Err(RepoError::TagNotFound(parent_id));
                }
                if is_self_or_ancestor(&tx, id, parent_id)? {
                    return Err(RepoError::InvalidInput(format!(
                        "tag {parent_id} cannot become the parent of {id}: it is the tag itself or one of its descendants"
                    )));
                }
            }

            tx.execute(
                "UPDATE tags SET parent_id = ?2 WHERE id = ?1;",
                params![id.to_string(), parent_id.map(|value| value.to_string())],
            )?;
            tx.commit()?;
            Ok(())
        })
    }
}

/// Whether a tag with `id` exists.
pub fn tag_exists(conn: &Connection, id: TagId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM tags WHERE id = ?1);",
        [id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

/// Parses one `tags` row.
pub(crate) fn parse_tag_row(row: &Row<'_>) -> RepoResult<Tag> {
    let id_text: String = row.get("id")?;
    let parent_id = row
        .get::<_, Option<String>>("parent_id")?
        .map(|value| parse_uuid(&value, "tags.parent_id"))
        .transpose()?;
    Ok(Tag {
        id: parse_uuid(&id_text, "tags.id")?,
        name: row.get("name")?,
        parent_id,
        created_at: row.get("created_at")?,
    })
}

fn normalize_lookup_name(name: &str) -> RepoResult<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(RepoError::InvalidInput(
            "tag name must not be empty".to_string(),
        ));
    }
    Ok(trimmed)
}

fn load_tag_by_name(conn: &Connection, name: &str) -> RepoResult<Option<Tag>> {
    conn.query_row(
        &format!("{TAG_SELECT_SQL} WHERE name = ?1;"),
        [name],
        |row| Ok(parse_tag_row(row)),
    )
    .optional()?
    .transpose()
}

/// Whether `candidate` is `tag_id` or sits below it in the hierarchy.
///
/// Walks upward from `candidate`; `UNION` drops revisited ids so an
/// already-corrupted chain still terminates.
fn is_self_or_ancestor(conn: &Connection, tag_id: TagId, candidate: TagId) -> RepoResult<bool> {
    let found: i64 = conn.query_row(
        "WITH RECURSIVE lineage(id) AS (
            SELECT ?1
            UNION
            SELECT t.parent_id
            FROM tags t
            INNER JOIN lineage l ON t.id = l.id
            WHERE t.parent_id IS NOT NULL
        )
        SELECT EXISTS(SELECT 1 FROM lineage WHERE id = ?2);",
        params![candidate.to_string(), tag_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(found == 1)
}
