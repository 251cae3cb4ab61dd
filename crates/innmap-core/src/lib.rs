//! innmap entity-resolution and map-placement engine
//!
//! Takes many noisy per-chapter extractions of place names, relationships,
//! and containment facts and resolves them into one canonical, deduplicated,
//! spatially-placed dataset:
//!
//! - [`normalize`]/[`to_display_name`] reduce surface forms to stable keys,
//! - [`Vocabulary`] resolves known variants and drops real-world names,
//! - [`Aggregator`] merges the full chapter history into one dataset,
//! - [`TraceabilityFilter`] keeps only locations anchored to known geography,
//! - [`CoordinateEstimator`] synthesizes deterministic 2D positions without
//!   ever overwriting a human-supplied one.
//!
//! Everything here is single-threaded, batch, and CPU-bound over data the
//! caller has already read into memory; the only I/O seam is the
//! [`ExtractionSource`] trait. Callers are responsible for serializing runs.

mod aggregate;
mod coords;
mod normalize;
mod trace;
mod vocab;

pub use aggregate::{AggregateConfig, Aggregator, ExtractionSource};
pub use coords::{CoordinateEstimator, SeedTable};
pub use normalize::{normalize, to_display_name};
pub use trace::TraceabilityFilter;
pub use vocab::Vocabulary;

use std::path::PathBuf;

/// Errors from loading external configuration tables.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
