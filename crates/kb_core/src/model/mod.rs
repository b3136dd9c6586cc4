//! Domain model for captured entries, hierarchical tags and embeddings.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Own content/name validation and the embedding byte encoding.
//!
//! # Invariants
//! - Every entry and tag is identified by a stable UUID.
//! - Entry content is immutable after creation; there is no update path.

pub mod embedding;
pub mod entry;
pub mod tag;
