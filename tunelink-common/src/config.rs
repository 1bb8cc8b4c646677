//! Matcher configuration loading and validation
//!
//! Collaborators hand the engine a single validated [`MatcherConfig`],
//! deserializable from TOML. Every field has a default reproducing the
//! stock matching behavior; `validate()` refuses nonsensical values at
//! construction time so the engine never runs with them.

use crate::types::Confidence;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Point values for every scoring signal.
///
/// Positive values are bonuses, negative values penalties. The defaults
/// are the stock weight table; collaborators may override individual
/// entries via TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightTable {
    /// Normalized titles identical
    pub title_exact: i32,
    /// Maximum points for a fuzzy title match, scaled by similarity
    pub title_fuzzy_max: i32,
    /// Normalized artists identical
    pub artist_exact: i32,
    /// Artist token-set similarity above threshold
    pub artist_fuzzy: i32,
    /// Normalized albums identical
    pub album_exact: i32,
    /// Album token-set similarity above threshold
    pub album_fuzzy: i32,
    /// Year equal or off by one
    pub year_match: i32,
    /// Duration within the tight window (<= 2s)
    pub duration_tight: i32,
    /// Duration within the loose window (<= 4s)
    pub duration_loose: i32,
    /// Both sides carry the same non-empty ISRC
    pub isrc_match: i32,
    /// Local file lacks an album tag the remote side has
    pub album_missing_local: i32,
    /// Remote track lacks an album the local side has
    pub album_missing_remote: i32,
    /// One side lacks a year the other side has
    pub year_missing: i32,
    /// Exactly one side carries a Live/Remix/Acoustic/Edit marker
    pub variant_mismatch: i32,
    /// Album and year absent on both sides, with no ISRC anywhere
    pub metadata_missing: i32,
}

impl Default for WeightTable {
    fn default() -> Self {
        Self {
            title_exact: 45,
            title_fuzzy_max: 30,
            artist_exact: 30,
            artist_fuzzy: 20,
            album_exact: 18,
            album_fuzzy: 12,
            year_match: 6,
            duration_tight: 6,
            duration_loose: 3,
            isrc_match: 15,
            album_missing_local: -8,
            album_missing_remote: -5,
            year_missing: -4,
            variant_mismatch: -6,
            metadata_missing: -20,
        }
    }
}

impl WeightTable {
    /// True when no bonus signal can ever award points.
    fn is_degenerate(&self) -> bool {
        self.title_exact <= 0
            && self.title_fuzzy_max <= 0
            && self.artist_exact <= 0
            && self.artist_fuzzy <= 0
            && self.album_exact <= 0
            && self.album_fuzzy <= 0
            && self.year_match <= 0
            && self.duration_tight <= 0
            && self.duration_loose <= 0
            && self.isrc_match <= 0
    }
}

/// Similarity cutoffs for the fuzzy signals (0.0-1.0)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzyThresholds {
    pub title: f64,
    pub artist: f64,
    pub album: f64,
}

impl Default for FuzzyThresholds {
    fn default() -> Self {
        Self {
            title: 0.88,
            artist: 0.92,
            album: 0.95,
        }
    }
}

/// Raw-score cutoffs mapping scores to confidence tiers.
///
/// Evaluated top-down; scores below `low` are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierCutoffs {
    pub certain: i32,
    pub high: i32,
    pub medium: i32,
    pub low: i32,
}

impl Default for TierCutoffs {
    fn default() -> Self {
        Self {
            certain: 100,
            high: 90,
            medium: 78,
            low: 65,
        }
    }
}

impl TierCutoffs {
    /// Map a raw score to its confidence tier.
    ///
    /// Total, monotonic step function: first cutoff met (top-down) wins.
    pub fn classify(&self, score: i32) -> Confidence {
        if score >= self.certain {
            Confidence::Certain
        } else if score >= self.high {
            Confidence::High
        } else if score >= self.medium {
            Confidence::Medium
        } else if score >= self.low {
            Confidence::Low
        } else {
            Confidence::Rejected
        }
    }
}

/// Complete matching-engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub weights: WeightTable,
    pub fuzzy: FuzzyThresholds,
    pub tiers: TierCutoffs,
    /// Duration prefilter tolerance in seconds (window floor is +/-4s)
    pub duration_tolerance_secs: f64,
    /// Upper bound on candidates scored per track
    pub max_candidates_per_track: usize,
    /// Invoke the progress callback every N tracks
    pub progress_interval: usize,
    /// Append the release year to normalized text
    pub year_aware_normalization: bool,
    /// Capacity of the normalizer's memo cache
    pub normalizer_cache_capacity: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            weights: WeightTable::default(),
            fuzzy: FuzzyThresholds::default(),
            tiers: TierCutoffs::default(),
            duration_tolerance_secs: 2.0,
            max_candidates_per_track: 500,
            progress_interval: 100,
            year_aware_normalization: false,
            normalizer_cache_capacity: 4096,
        }
    }
}

impl MatcherConfig {
    /// Validate the configuration, refusing values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !self.duration_tolerance_secs.is_finite() || self.duration_tolerance_secs < 0.0 {
            return Err(Error::Config(format!(
                "duration_tolerance_secs must be non-negative, got {}",
                self.duration_tolerance_secs
            )));
        }
        if self.max_candidates_per_track == 0 {
            return Err(Error::Config(
                "max_candidates_per_track must be at least 1".to_string(),
            ));
        }
        if self.progress_interval == 0 {
            return Err(Error::Config(
                "progress_interval must be at least 1".to_string(),
            ));
        }
        if self.normalizer_cache_capacity == 0 {
            return Err(Error::Config(
                "normalizer_cache_capacity must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("fuzzy.title", self.fuzzy.title),
            ("fuzzy.artist", self.fuzzy.artist),
            ("fuzzy.album", self.fuzzy.album),
        ] {
            if !(0.0..1.0).contains(&value) {
                return Err(Error::Config(format!(
                    "{} must be in [0.0, 1.0), got {}",
                    name, value
                )));
            }
        }
        let t = &self.tiers;
        if !(t.low < t.medium && t.medium < t.high && t.high <= t.certain) {
            return Err(Error::Config(format!(
                "tier cutoffs must be ordered low < medium < high <= certain, got {}/{}/{}/{}",
                t.low, t.medium, t.high, t.certain
            )));
        }
        if self.weights.is_degenerate() {
            return Err(Error::Config(
                "weight table awards no points; matching would reject everything".to_string(),
            ));
        }
        Ok(())
    }

    /// Load and validate a configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}
