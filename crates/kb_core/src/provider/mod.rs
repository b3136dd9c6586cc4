//! Collaborator interfaces for classification and embedding.
//!
//! # Responsibility
//! - Define the classifier/embedder SPI the capture flow depends on.
//! - Share prompt construction and reply parsing across classifier
//!   implementations.
//!
//! Concrete HTTP adapters live outside the core crate.

pub mod classification;
pub mod spi;

pub use classification::{build_classification_prompt, parse_classification_reply};
pub use spi::{Classifier, Embedder, ProviderError, ProviderErrorKind, TagSuggestion};
