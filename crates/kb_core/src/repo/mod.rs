//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository writes validate input before persistence.
//! - Repository APIs return semantic errors (`EntryNotFound`, `TagNotFound`)
//!   in addition to DB transport errors.
//! - Create-if-absent writes are single-statement upserts wrapped in the
//!   bounded retry policy from [`retry`].

pub mod embedding_repo;
pub mod entry_repo;
pub mod link_repo;
pub mod retry;
pub mod tag_repo;
