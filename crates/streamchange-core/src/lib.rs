//! Shared plumbing for the stream change cache crates
//!
//! - `error`: the crate-wide error type and `Result` alias
//! - `config`: layered settings (files + `STREAMCHANGE__*` env vars)
//! - `logging`: tracing subscriber setup

pub mod config;
pub mod error;
pub mod logging;

pub use config::{CacheSettings, LoggingConfig, NamedCacheSettings, Settings, DEFAULT_MAX_SIZE};
pub use error::*;
pub use logging::init_tracing;

/// A position in the authoritative change log. Strictly increasing over the
/// lifetime of the log.
pub type StreamPosition = i64;
