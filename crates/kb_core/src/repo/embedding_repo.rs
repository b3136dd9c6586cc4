//! Embedding persistence.
//!
//! # Invariants
//! - One row per entry; a later save replaces vector, model and timestamp.
//! - Vector length is not checked against other stored embeddings.

use crate::db::now_epoch_ms;
use crate::model::embedding::{decode_vector, encode_vector, Embedding};
use crate::model::entry::EntryId;
use crate::repo::entry_repo::{entry_exists, RepoError, RepoResult};
use crate::repo::retry::with_conflict_retry;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

/// Repository interface for entry embeddings.
pub trait EmbeddingRepository {
    /// Stores `vector` for the entry, replacing any previous embedding.
    fn save_embedding(&self, entry_id: EntryId, vector: &[f64], model: &str) -> RepoResult<()>;
    /// Loads the stored embedding of one entry.
    fn get_embedding(&self, entry_id: EntryId) -> RepoResult<Option<Embedding>>;
}

/// SQLite-backed embedding repository.
pub struct SqliteEmbeddingRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEmbeddingRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl EmbeddingRepository for SqliteEmbeddingRepository<'_> {
    fn save_embedding(&self, entry_id: EntryId, vector: &[f64], model: &str) -> RepoResult<()> {
        if vector.is_empty() {
            return Err(RepoError::InvalidInput(
                "embedding vector must not be empty".to_string(),
            ));
        }
        let model = model.trim();
        if model.is_empty() {
            return Err(RepoError::InvalidInput(
                "embedding model name must not be empty".to_string(),
            ));
        }
        let blob = encode_vector(vector);

        with_conflict_retry("embedding_save", || {
            let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
            if !entry_exists(&tx, entry_id)? {
                return Err(RepoError::EntryNotFound(entry_id));
            }

            tx.execute(
                "INSERT INTO embeddings (entry_id, vector, model, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(entry_id) DO UPDATE SET
                    vector = excluded.vector,
                    model = excluded.model,
                    created_at = excluded.created_at;",
                params![entry_id.to_string(), blob, model, now_epoch_ms()],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    fn get_embedding(&self, entry_id: EntryId) -> RepoResult<Option<Embedding>> {
        let row = self
            .conn
            .query_row(
                "SELECT vector, model, created_at FROM embeddings WHERE entry_id = ?1;",
                [entry_id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, Vec<u8>>("vector")?,
                        row.get::<_, String>("model")?,
                        row.get::<_, i64>("created_at")?,
                    ))
                },
            )
            .optional()?;

        let Some((blob, model, created_at)) = row else {
            return Ok(None);
        };
        let vector = decode_vector(&blob).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "embedding blob of {} bytes for entry {entry_id} is not a whole number of f64 components",
                blob.len()
            ))
        })?;
        Ok(Some(Embedding {
            entry_id,
            vector,
            model,
            created_at,
        }))
    }
}
