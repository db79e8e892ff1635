//! Pluggable article body extraction.
//!
//! Each feed is configured with the name of an extraction strategy; the
//! registry resolves that name to an implementation before any I/O happens.
//! Supporting a new site means a new implementation with its own immutable
//! selector set, not a modification of a shared one.

mod reuters;

pub use reuters::ReutersExtractor;

use crate::config::ConfigError;
use std::sync::Arc;

/// Converts a raw HTML document into normalized plain text.
///
/// Extraction is soft by design: an implementation that finds none of its
/// target regions returns an empty string rather than an error, because a
/// missing body never aborts a run.
pub trait BodyExtractor: Send + Sync + std::fmt::Debug {
    fn extract(&self, raw_html: &str) -> String;
}

/// Resolve an extractor by its configured name.
pub fn resolve(name: &str) -> Result<Arc<dyn BodyExtractor>, ConfigError> {
    match name {
        "reuters" => Ok(Arc::new(ReutersExtractor::new())),
        other => Err(ConfigError::UnknownExtractor(other.to_string())),
    }
}
