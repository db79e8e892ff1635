//! Watermark-deduplicated feed ingestion.
//!
//! One run ingests a single RSS/Atom feed: entries newer than the stored
//! watermark (`max(posted)` in the active partition) are enriched with a
//! fully extracted article body and persisted through the [`storage::Store`]
//! abstraction. The exporter reads the same store back out as CSV.

pub mod config;
pub mod export;
pub mod extract;
pub mod fingerprint;
pub mod pipeline;
pub mod storage;
