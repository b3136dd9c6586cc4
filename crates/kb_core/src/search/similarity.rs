//! Cosine-similarity ranking over stored embeddings.
//!
//! # Responsibility
//! - Score every stored embedding against a query vector.
//! - Return the top matches with their entries hydrated.
//!
//! # Invariants
//! - Similarity is exactly `0.0` when either vector has zero norm, the
//!   lengths differ, or the result is not finite. Scoring never fails.
//! - Ordering is `similarity DESC, entry id ASC`, so ties are deterministic.
//! - The excluded entry never appears in results.
//!
//! # Scale
//! This is a brute-force O(n·d) scan per query. It suits a personal
//! knowledge base; past low tens of thousands of embeddings a vector index
//! is required.

use crate::db::DbError;
use crate::error::ErrorKind;
use crate::model::embedding::decode_vector;
use crate::model::entry::{Entry, EntryId};
use crate::repo::entry_repo::{load_tags_for_entry, parse_entry_row, RepoError};
use log::warn;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type for similarity APIs.
pub type SearchResult<T> = Result<T, SearchError>;

/// Search-layer error for DB interaction and result decoding.
#[derive(Debug)]
pub enum SearchError {
    Db(DbError),
    InvalidData(String),
}

impl SearchError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::StorageUnavailable
    }
}

impl Display for SearchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid similarity row: {message}"),
        }
    }
}

impl Error for SearchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for SearchError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SearchError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<RepoError> for SearchError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Db(err) => Self::Db(err),
            other => Self::InvalidData(other.to_string()),
        }
    }
}

/// Options for one similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityQuery {
    pub vector: Vec<f64>,
    /// Maximum hits to return. `0` yields no hits.
    pub limit: u32,
    /// Entry to leave out, typically the one the query vector came from.
    pub exclude: Option<EntryId>,
}

impl SimilarityQuery {
    pub fn new(vector: Vec<f64>, limit: u32) -> Self {
        Self {
            vector,
            limit,
            exclude: None,
        }
    }

    pub fn excluding(mut self, entry_id: EntryId) -> Self {
        self.exclude = Some(entry_id);
        self
    }
}

/// One ranked hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarEntry {
    pub entry: Entry,
    pub similarity: f64,
}

/// Ranks stored embeddings by cosine similarity to `query.vector`.
pub fn find_similar(conn: &Connection, query: &SimilarityQuery) -> SearchResult<Vec<SimilarEntry>> {
    if query.limit == 0 {
        return Ok(Vec::new());
    }

    let exclude = query.exclude.map(|id| id.to_string());
    let mut stmt = conn.prepare(
        "SELECT
            entries.id AS id,
            entries.content AS content,
            entries.created_at AS created_at,
            entries.last_viewed_at AS last_viewed_at,
            em.vector AS vector
         FROM embeddings em
         INNER JOIN entries ON entries.id = em.entry_id
         WHERE ?1 IS NULL OR entries.id != ?1;",
    )?;
    let mut rows = stmt.query([exclude])?;

    let mut scored = Vec::new();
    while let Some(row) = rows.next()? {
        let entry = parse_entry_row(row)?;
        let blob: Vec<u8> = row.get("vector")?;
        let Some(stored) = decode_vector(&blob) else {
            warn!(
                "event=similarity_scan module=search status=skip reason=undecodable_blob blob_len={}",
                blob.len()
            );
            continue;
        };
        let similarity = cosine_similarity(&query.vector, &stored);
        scored.push(SimilarEntry { entry, similarity });
    }
    drop(rows);

    rank_in_place(&mut scored);
    scored.truncate(usize::try_from(query.limit).unwrap_or(usize::MAX));

    for hit in &mut scored {
        hit.entry.tags = load_tags_for_entry(conn, hit.entry.id)?;
    }
    Ok(scored)
}

/// Cosine similarity of two vectors, in `[-1, 1]`.
///
/// Returns `0.0` instead of failing on all-zero vectors, length mismatch
/// or non-finite components. Each vector is divided by its largest
/// magnitude first, so tiny and huge components neither underflow nor
/// overflow the norms.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (scale_a, scale_b) = (max_magnitude(a), max_magnitude(b));
    if scale_a == 0.0 || scale_b == 0.0 || !scale_a.is_finite() || !scale_b.is_finite() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x / scale_a, y / scale_b);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    if !similarity.is_finite() {
        return 0.0;
    }
    // Rounding can push parallel vectors a hair past 1.
    similarity.clamp(-1.0, 1.0)
}

fn max_magnitude(values: &[f64]) -> f64 {
    values.iter().fold(0.0f64, |max, value| max.max(value.abs()))
}

fn rank_in_place(hits: &mut [SimilarEntry]) {
    hits.sort_by(|left, right| {
        right
            .similarity
            .total_cmp(&left.similarity)
            .then_with(|| left.entry.id.cmp(&right.entry.id))
    });
}
