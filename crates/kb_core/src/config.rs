//! Process configuration from environment variables.
//!
//! # Invariants
//! - Blank values count as unset.
//! - Unparseable or zero numeric values fall back to their defaults.

use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DB_PATH: &str = "KB_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "KB_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "KB_LOG_DIR";
pub const ENV_ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const ENV_CLASSIFIER_MODEL: &str = "KB_CLASSIFIER_MODEL";
pub const ENV_CLASSIFIER_TIMEOUT_MS: &str = "KB_CLASSIFIER_TIMEOUT_MS";
pub const ENV_VOYAGE_API_KEY: &str = "VOYAGE_API_KEY";
pub const ENV_EMBEDDER_MODEL: &str = "KB_EMBEDDER_MODEL";
pub const ENV_EMBEDDER_TIMEOUT_MS: &str = "KB_EMBEDDER_TIMEOUT_MS";
pub const ENV_SIMILAR_LIMIT: &str = "KB_SIMILAR_LIMIT";

pub const DEFAULT_CLASSIFIER_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_EMBEDDER_MODEL: &str = "voyage-3-lite";
const DEFAULT_CLASSIFIER_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_EMBEDDER_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_SIMILAR_LIMIT: u32 = 5;

/// Settings for one HTTP collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// `None` disables the collaborator.
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Resolved runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KbConfig {
    pub db_path: PathBuf,
    pub log_level: Option<String>,
    /// File logging target; stderr logging when unset.
    pub log_dir: Option<PathBuf>,
    pub classifier: ProviderConfig,
    pub embedder: ProviderConfig,
    pub similar_limit: u32,
}

impl KbConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to
    /// its raw value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let positive_u64 = |name: &str, default_value: u64| {
            non_empty(name)
                .and_then(|raw| raw.parse::<u64>().ok())
                .filter(|value| *value > 0)
                .unwrap_or(default_value)
        };

        let db_path = non_empty(ENV_DB_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| default_db_path(non_empty("HOME")));
        let similar_limit = non_empty(ENV_SIMILAR_LIMIT)
            .and_then(|raw| raw.parse::<u32>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_SIMILAR_LIMIT);

        Self {
            db_path,
            log_level: non_empty(ENV_LOG_LEVEL),
            log_dir: non_empty(ENV_LOG_DIR).map(PathBuf::from),
            classifier: ProviderConfig {
                api_key: non_empty(ENV_ANTHROPIC_API_KEY),
                model: non_empty(ENV_CLASSIFIER_MODEL)
                    .unwrap_or_else(|| DEFAULT_CLASSIFIER_MODEL.to_string()),
                timeout: Duration::from_millis(positive_u64(
                    ENV_CLASSIFIER_TIMEOUT_MS,
                    DEFAULT_CLASSIFIER_TIMEOUT_MS,
                )),
            },
            embedder: ProviderConfig {
                api_key: non_empty(ENV_VOYAGE_API_KEY),
                model: non_empty(ENV_EMBEDDER_MODEL)
                    .unwrap_or_else(|| DEFAULT_EMBEDDER_MODEL.to_string()),
                timeout: Duration::from_millis(positive_u64(
                    ENV_EMBEDDER_TIMEOUT_MS,
                    DEFAULT_EMBEDDER_TIMEOUT_MS,
                )),
            },
            similar_limit,
        }
    }
}

/// `$HOME/.kb/kb.db`, or `kb.db` in the working directory without a home.
pub fn default_db_path(home: Option<String>) -> PathBuf {
    match home {
        Some(home) => PathBuf::from(home).join(".kb").join("kb.db"),
        None => PathBuf::from("kb.db"),
    }
}
