//! Configuration file parser.
//!
//! The config file is optional — a missing file yields `Config::default()`.
//! Unknown keys are accepted (and logged) so older files keep working, but
//! an unresolvable backend or extractor name fails fast, before any network
//! or storage I/O.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown storage backend '{0}', expected 'relational' or 'document'")]
    UnknownBackend(String),

    #[error("unknown body extractor '{0}'")]
    UnknownExtractor(String),
}

/// Storage backend selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Relational,
    Document,
}

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified;
/// missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Active storage backend: "relational" or "document".
    pub backend: String,

    /// Logical partition (schema/database) isolating this deployment's data.
    pub partition: String,

    /// Body extractor applied to items from the configured feed.
    pub extractor: String,

    /// Syndication feed ingested by `run`.
    pub feed_url: String,

    /// SQLite file (relational) or data root directory (document).
    /// Derived from the partition name when absent.
    pub database_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: "relational".to_string(),
            partition: "rsscraper".to_string(),
            extractor: "reuters".to_string(),
            feed_url: "http://feeds.reuters.com/reuters/topNews".to_string(),
            database_path: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "backend",
                "partition",
                "extractor",
                "feed_url",
                "database_path",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            backend = %config.backend,
            partition = %config.partition,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse the configured backend name.
    pub fn backend(&self) -> Result<Backend, ConfigError> {
        match self.backend.as_str() {
            "relational" => Ok(Backend::Relational),
            "document" => Ok(Backend::Document),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }

    /// Apply a per-invocation partition override; the config file itself is
    /// never rewritten.
    pub fn with_partition(mut self, partition: Option<String>) -> Self {
        if let Some(name) = partition {
            self.partition = name;
        }
        self
    }

    /// SQLite database file for the active partition.
    pub fn relational_path(&self) -> String {
        self.database_path
            .clone()
            .unwrap_or_else(|| format!("{}.db", self.partition))
    }

    /// Document-store directory for the active partition.
    pub fn document_root(&self) -> PathBuf {
        let root = self.database_path.as_deref().unwrap_or("data");
        PathBuf::from(root).join(&self.partition)
    }
}
