//! Entry repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide create/read/delete APIs over the `entries` table.
//! - Own pagination, tag-scoped listing, substring search and the
//!   staleness ordering used by suggestions.
//!
//! # Invariants
//! - Entries are never updated except for `last_viewed_at`.
//! - Listings are deterministic: `created_at DESC, id ASC`.
//! - Staleness listings order `last_viewed_at ASC NULLS FIRST`, then
//!   `created_at DESC, id ASC`.
//! - Deletion relies on `ON DELETE CASCADE` for links and embeddings.

use crate::db::{now_epoch_ms, DbError};
use crate::error::ErrorKind;
use crate::model::entry::{validate_content, Entry, EntryId, EntryValidationError};
use crate::model::tag::{Tag, TagId};
use crate::repo::tag_repo::{parse_tag_row, tag_exists};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const ENTRY_SELECT_SQL: &str = "SELECT
    entries.id AS id,
    entries.content AS content,
    entries.created_at AS created_at,
    entries.last_viewed_at AS last_viewed_at
FROM entries";

const ENTRIES_DEFAULT_LIMIT: u32 = 20;
const ENTRIES_LIMIT_MAX: u32 = 200;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by entry, tag, link and embedding persistence.
#[derive(Debug)]
pub enum RepoError {
    Validation(EntryValidationError),
    InvalidInput(String),
    Db(DbError),
    EntryNotFound(EntryId),
    TagNotFound(TagId),
    /// A write lost every bounded retry against concurrent writers.
    Conflict {
        operation: &'static str,
        attempts: u32,
    },
    InvalidData(String),
}

impl RepoError {
    /// Maps this error onto the caller-facing category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::EntryNotFound(_) | Self::TagNotFound(_) => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::ConflictRetryable,
            Self::Db(_) | Self::InvalidData(_) => ErrorKind::StorageUnavailable,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::EntryNotFound(id) => write!(f, "entry not found: {id}"),
            Self::TagNotFound(id) => write!(f, "tag not found: {id}"),
            Self::Conflict {
                operation,
                attempts,
            } => write!(
                f,
                "write conflict in {operation} persisted after {attempts} attempts"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EntryValidationError> for RepoError {
    fn from(value: EntryValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Query options for listing entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryListQuery {
    /// Maximum rows to return. Defaults to 20 and clamps to 200.
    pub limit: Option<u32>,
    /// Number of rows to skip.
    pub offset: u32,
}

/// Repository interface for entry operations.
pub trait EntryRepository {
    /// Validates and inserts a new entry.
    fn create_entry(&self, content: &str) -> RepoResult<Entry>;
    /// Loads one entry with its tags by exact id.
    fn get_entry(&self, id: EntryId) -> RepoResult<Option<Entry>>;
    /// Lists entries newest first with pagination.
    fn list_entries(&self, query: &EntryListQuery) -> RepoResult<Vec<Entry>>;
    /// Lists entries linked to a tag, optionally including all descendant tags.
    fn list_entries_by_tag(
        &self,
        tag_id: TagId,
        include_descendants: bool,
    ) -> RepoResult<Vec<Entry>>;
    /// Tag-scoped listing with the same pagination as `list_entries`.
    fn list_entries_by_tag_page(
        &self,
        tag_id: TagId,
        include_descendants: bool,
        query: &EntryListQuery,
    ) -> RepoResult<Vec<Entry>>;
    /// Case-insensitive substring match over content, newest first.
    fn search_entries(&self, needle: &str) -> RepoResult<Vec<Entry>>;
    /// Removes one entry together with its links and embedding.
    fn delete_entry(&self, id: EntryId) -> RepoResult<()>;
    /// Stamps `last_viewed_at` with the current time and returns it.
    fn touch_viewed(&self, id: EntryId) -> RepoResult<i64>;
    /// Lists the least recently viewed entries.
    fn list_stale(&self, limit: u32) -> RepoResult<Vec<Entry>>;
    /// Lists entries sharing at least one tag with `id`, least recently viewed first.
    fn list_sharing_tags(&self, id: EntryId, limit: u32) -> RepoResult<Vec<Entry>>;
}

/// SQLite-backed entry repository.
pub struct SqliteEntryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEntryRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl EntryRepository for SqliteEntryRepository<'_> {
    fn create_entry(&self, content: &str) -> RepoResult<Entry> {
        let entry = Entry::new(content, now_epoch_ms())?;

        self.conn.execute(
            "INSERT INTO entries (id, content, created_at, last_viewed_at)
             VALUES (?1, ?2, ?3, NULL);",
            params![
                entry.id.to_string(),
                entry.content.as_str(),
                entry.created_at
            ],
        )?;

        Ok(entry)
    }

    fn get_entry(&self, id: EntryId) -> RepoResult<Option<Entry>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ENTRY_SELECT_SQL} WHERE entries.id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            let mut entry = parse_entry_row(row)?;
            entry.tags = load_tags_for_entry(self.conn, entry.id)?;
            return Ok(Some(entry));
        }
        Ok(None)
    }

    fn list_entries(&self, query: &EntryListQuery) -> RepoResult<Vec<Entry>> {
        let mut sql = format!("{ENTRY_SELECT_SQL} ORDER BY created_at DESC, id ASC LIMIT ?");
        let mut bind_values = vec![Value::Integer(i64::from(normalize_entry_limit(
            query.limit,
        )))];
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        query_entries(self.conn, &sql, bind_values)
    }

    fn list_entries_by_tag(
        &self,
        tag_id: TagId,
        include_descendants: bool,
    ) -> RepoResult<Vec<Entry>> {
        query_entries_by_tag(self.conn, tag_id, include_descendants, None)
    }

    fn list_entries_by_tag_page(
        &self,
        tag_id: TagId,
        include_descendants: bool,
        query: &EntryListQuery,
    ) -> RepoResult<Vec<Entry>> {
        query_entries_by_tag(self.conn, tag_id, include_descendants, Some(query))
    }

    fn search_entries(&self, needle: &str) -> RepoResult<Vec<Entry>> {
        if needle.trim().is_empty() {
            return Err(RepoError::InvalidInput(
                "search query must not be empty".to_string(),
            ));
        }

        let sql = format!(
            "{ENTRY_SELECT_SQL}
             WHERE instr(lower(content), lower(?1)) > 0
             ORDER BY created_at DESC, id ASC;"
        );
        query_entries(self.conn, &sql, vec![Value::Text(needle.to_string())])
    }

    fn delete_entry(&self, id: EntryId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM entries WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::EntryNotFound(id));
        }
        Ok(())
    }

    fn touch_viewed(&self, id: EntryId) -> RepoResult<i64> {
        let viewed_at = now_epoch_ms();
        let changed = self.conn.execute(
            "UPDATE entries SET last_viewed_at = ?2 WHERE id = ?1;",
            params![id.to_string(), viewed_at],
        )?;
        if changed == 0 {
            return Err(RepoError::EntryNotFound(id));
        }
        Ok(viewed_at)
    }

    fn list_stale(&self, limit: u32) -> RepoResult<Vec<Entry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let sql = format!(
            "{ENTRY_SELECT_SQL}
             ORDER BY last_viewed_at ASC NULLS FIRST, created_at DESC, id ASC
             LIMIT ?1;"
        );
        query_entries(self.conn, &sql, vec![Value::Integer(i64::from(limit))])
    }

    fn list_sharing_tags(&self, id: EntryId, limit: u32) -> RepoResult<Vec<Entry>> {
        if !entry_exists(self.conn, id)? {
            return Err(RepoError::EntryNotFound(id));
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let sql = format!(
            "{ENTRY_SELECT_SQL}
             WHERE entries.id != ?1
               AND EXISTS (
                 SELECT 1
                 FROM entry_tags mine
                 INNER JOIN entry_tags theirs ON theirs.tag_id = mine.tag_id
                 WHERE mine.entry_id = ?1
                   AND theirs.entry_id = entries.id
               )
             ORDER BY last_viewed_at ASC NULLS FIRST, created_at DESC, id ASC
             LIMIT ?2;"
        );
        query_entries(
            self.conn,
            &sql,
            vec![
                Value::Text(id.to_string()),
                Value::Integer(i64::from(limit)),
            ],
        )
    }
}

fn query_entries_by_tag(
    conn: &Connection,
    tag_id: TagId,
    include_descendants: bool,
    page: Option<&EntryListQuery>,
) -> RepoResult<Vec<Entry>> {
    if !tag_exists(conn, tag_id)? {
        return Err(RepoError::TagNotFound(tag_id));
    }

    // UNION (not UNION ALL) drops revisited ids, so a cyclic parent
    // chain still terminates.
    let mut sql = format!(
        "WITH RECURSIVE scope(id) AS (
            SELECT id FROM tags WHERE id = ?
            UNION
            SELECT child.id
            FROM tags child
            INNER JOIN scope parent ON child.parent_id = parent.id
            WHERE ? = 1
        )
        {ENTRY_SELECT_SQL}
        WHERE EXISTS (
            SELECT 1
            FROM entry_tags et
            WHERE et.entry_id = entries.id
              AND et.tag_id IN (SELECT id FROM scope)
        )
        ORDER BY created_at DESC, id ASC"
    );
    let mut bind_values = vec![
        Value::Text(tag_id.to_string()),
        Value::Integer(i64::from(include_descendants)),
    ];
    if let Some(page) = page {
        sql.push_str(" LIMIT ?");
        bind_values.push(Value::Integer(i64::from(normalize_entry_limit(page.limit))));
        if page.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(page.offset)));
        }
    }
    sql.push(';');

    query_entries(conn, &sql, bind_values)
}

/// Normalizes list limit according to the entries contract.
pub fn normalize_entry_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => ENTRIES_DEFAULT_LIMIT,
        Some(value) if value > ENTRIES_LIMIT_MAX => ENTRIES_LIMIT_MAX,
        Some(value) => value,
    }
}

/// Whether an entry with `id` exists.
pub fn entry_exists(conn: &Connection, id: EntryId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM entries WHERE id = ?1);",
        [id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

/// Loads the tags linked to one entry, ordered by name then id.
pub fn load_tags_for_entry(conn: &Connection, entry_id: EntryId) -> RepoResult<Vec<Tag>> {
    let mut stmt = conn.prepare(
        "SELECT t.id AS id, t.name AS name, t.parent_id AS parent_id, t.created_at AS created_at
         FROM entry_tags et
         INNER JOIN tags t ON t.id = et.tag_id
         WHERE et.entry_id = ?1
         ORDER BY t.name ASC, t.id ASC;",
    )?;
    let mut rows = stmt.query([entry_id.to_string()])?;
    let mut tags = Vec::new();
    while let Some(row) = rows.next()? {
        tags.push(parse_tag_row(row)?);
    }
    Ok(tags)
}

/// Parses one row shaped like [`ENTRY_SELECT_SQL`] into an [`Entry`] without tags.
pub(crate) fn parse_entry_row(row: &Row<'_>) -> RepoResult<Entry> {
    let id_text: String = row.get("id")?;
    let entry = Entry {
        id: parse_uuid(&id_text, "entries.id")?,
        content: row.get("content")?,
        created_at: row.get("created_at")?,
        last_viewed_at: row.get("last_viewed_at")?,
        tags: Vec::new(),
    };
    validate_content(&entry.content).map_err(|_| {
        RepoError::InvalidData(format!("blank content persisted for entry {}", entry.id))
    })?;
    Ok(entry)
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn query_entries(conn: &Connection, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Entry>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut entries = Vec::new();
    while let Some(row) = rows.next()? {
        entries.push(parse_entry_row(row)?);
    }
    drop(rows);

    for entry in &mut entries {
        entry.tags = load_tags_for_entry(conn, entry.id)?;
    }
    Ok(entries)
}
