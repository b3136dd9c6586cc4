//! Retrieval entry points beyond plain listing.
//!
//! # Responsibility
//! - Rank stored embeddings against a query vector.
//! - Keep result shaping (ordering, truncation, tag hydration) inside core.

pub mod similarity;
