//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep the CLI and collaborator adapters decoupled from storage details.

pub mod capture_service;
pub mod entry_service;
pub mod suggestion_service;
pub mod tag_service;
