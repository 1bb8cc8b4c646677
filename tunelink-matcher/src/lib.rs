//! # TuneLink Matching Engine
//!
//! Resolves streaming-provider track records against local music files,
//! producing confidence-scored links. In-process library: no I/O, no
//! persistence; collaborators supply `RemoteTrack`/`LocalFile` batches and
//! consume the resulting `MatchRecord` stream.
//!
//! Pipeline per track: normalize -> duration prefilter -> token prescore ->
//! weighted scoring -> best-candidate selection -> confidence tier.

pub mod engine;
pub mod normalizer;
pub mod scoring;
pub mod selector;

pub use engine::{CandidateReport, MatchOptions, MatchOutcome, MatchStats, MatchingEngine};
pub use normalizer::{Normalized, NormalizedFile, NormalizedTrack, Normalizer};
pub use scoring::{PairScore, ScoreBreakdown, ScoringEngine, SignalDelta};
pub use selector::CandidateSelector;
