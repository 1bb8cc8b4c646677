//! # TuneLink Common Library
//!
//! Shared code for the TuneLink matching engine and its collaborators:
//! - Error types (`Error` enum, `Result` alias)
//! - Matcher configuration (weight table, thresholds, tolerances)
//! - Data model (`RemoteTrack`, `LocalFile`, `MatchRecord`, `Confidence`)

pub mod config;
pub mod error;
pub mod types;

pub use config::MatcherConfig;
pub use error::{Error, Result};
pub use types::{Confidence, LocalFile, MatchRecord, RemoteTrack};
