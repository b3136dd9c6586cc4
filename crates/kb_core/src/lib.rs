//! Core engine for the `kb` personal capture tool.
//! This crate is the single source of truth for storage and retrieval invariants.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod provider;
pub mod repo;
pub mod search;
pub mod service;

pub use config::{KbConfig, ProviderConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use error::ErrorKind;
pub use logging::{default_log_level, init_logging, logging_status, LogTarget};
pub use model::embedding::Embedding;
pub use model::entry::{Entry, EntryId, EntryValidationError};
pub use model::tag::{canonical_tag_name, Tag, TagId, TagLink, TagNode};
pub use provider::{Classifier, Embedder, ProviderError, ProviderErrorKind, TagSuggestion};
pub use repo::embedding_repo::{EmbeddingRepository, SqliteEmbeddingRepository};
pub use repo::entry_repo::{
    EntryListQuery, EntryRepository, RepoError, RepoResult, SqliteEntryRepository,
};
pub use repo::link_repo::{LinkRepository, SqliteLinkRepository};
pub use repo::tag_repo::{SqliteTagRepository, TagRepository};
pub use search::similarity::{
    cosine_similarity, find_similar, SearchError, SearchResult, SimilarEntry, SimilarityQuery,
};
pub use service::capture_service::{
    AppliedTag, CaptureOptions, CaptureReport, CaptureService, CaptureServiceError, CaptureStep,
    Degradation,
};
pub use service::entry_service::EntryService;
pub use service::suggestion_service::SuggestionService;
pub use service::tag_service::{build_tag_tree, TagService};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
