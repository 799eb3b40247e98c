//! Stream-position-indexed change tracking.
//!
//! - `cache`: [`StreamChangeCache`], answers "has this entity changed since
//!   position P?" from a bounded window of recent changes
//! - `registry`: the collaborator caches register with and report hits/misses to
//! - `metrics`: hit/miss counters and exportable snapshots

pub mod cache;
pub mod metrics;
pub mod registry;

pub use cache::*;
pub use metrics::*;
pub use registry::*;

// Re-export common types for convenience
pub use streamchange_core::{Result, StreamChangeError, StreamPosition};
