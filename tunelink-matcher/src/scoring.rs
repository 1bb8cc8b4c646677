//! Weighted scoring of a (track, file) pair
//!
//! Purely additive/subtractive weighted sum over the metadata signals, with
//! a transparent per-signal breakdown for diagnostics. The breakdown lists
//! every signal that fired, in evaluation order; nothing else ever consults
//! it.

use std::collections::BTreeSet;

use serde::Serialize;
use tunelink_common::config::{FuzzyThresholds, TierCutoffs, WeightTable};
use tunelink_common::{Confidence, MatcherConfig};

use crate::normalizer::{NormalizedFile, NormalizedTrack};

/// Duration difference (ms) counting as a tight match
const DURATION_TIGHT_MS: u32 = 2_000;
/// Duration difference (ms) counting as a loose match
const DURATION_LOOSE_MS: u32 = 4_000;

/// One fired signal and its point delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalDelta {
    pub signal: &'static str,
    pub points: i32,
}

/// Ordered list of fired signals. Purely diagnostic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub signals: Vec<SignalDelta>,
}

impl ScoreBreakdown {
    fn add(&mut self, signal: &'static str, points: i32) {
        self.signals.push(SignalDelta { signal, points });
    }

    /// Sum of all fired signals (equals the raw score).
    pub fn total(&self) -> i32 {
        self.signals.iter().map(|s| s.points).sum()
    }

    pub fn points_for(&self, signal: &str) -> Option<i32> {
        self.signals
            .iter()
            .find(|s| s.signal == signal)
            .map(|s| s.points)
    }

    /// Human-readable one-liner for logs and reports.
    pub fn summary(&self) -> String {
        let parts: Vec<String> = self
            .signals
            .iter()
            .map(|s| format!("{}:{:+}", s.signal, s.points))
            .collect();
        format!("total:{} [{}]", self.total(), parts.join(", "))
    }
}

/// Result of scoring one (track, file) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairScore {
    pub raw: i32,
    pub confidence: Confidence,
    pub breakdown: ScoreBreakdown,
}

/// Token-set similarity of two token sets (0.0-1.0).
///
/// Compares the sorted-joined intersection against each side's full sorted
/// string, so token order and duplication differences ("beatles the" vs
/// "the beatles") score 1.0. Two empty sets score 0.0.
pub fn token_set_similarity(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let join = |tokens: &mut dyn Iterator<Item = &String>| -> String {
        tokens.map(String::as_str).collect::<Vec<_>>().join(" ")
    };
    let intersection = join(&mut a.intersection(b));
    let full_a = join(&mut a.iter());
    let full_b = join(&mut b.iter());

    let inter_vs_a = strsim::normalized_levenshtein(&intersection, &full_a);
    let inter_vs_b = strsim::normalized_levenshtein(&intersection, &full_b);
    let a_vs_b = strsim::normalized_levenshtein(&full_a, &full_b);
    inter_vs_a.max(inter_vs_b).max(a_vs_b)
}

/// Pure weighted scorer for (track, file) pairs.
pub struct ScoringEngine {
    weights: WeightTable,
    fuzzy: FuzzyThresholds,
    tiers: TierCutoffs,
}

impl ScoringEngine {
    pub fn new(config: &MatcherConfig) -> Self {
        Self {
            weights: config.weights.clone(),
            fuzzy: config.fuzzy.clone(),
            tiers: config.tiers.clone(),
        }
    }

    /// Score one pair.
    ///
    /// Deterministic for fixed inputs and configuration; no hidden state.
    /// Missing-metadata penalties fire only when the counterpart side
    /// carries the field, and the complete-metadata penalty only when both
    /// sides lack album and year with no ISRC anywhere (a pair with no
    /// corroborating metadata at all).
    pub fn score(&self, track: &NormalizedTrack, file: &NormalizedFile) -> PairScore {
        let w = &self.weights;
        let mut breakdown = ScoreBreakdown::default();
        let mut raw = 0i32;
        let mut fire = |breakdown: &mut ScoreBreakdown, raw: &mut i32, signal, points| {
            *raw += points;
            breakdown.add(signal, points);
        };

        // Title
        let title_exact = !track.title.is_empty() && track.title.text == file.title.text;
        if title_exact {
            fire(&mut breakdown, &mut raw, "title_exact", w.title_exact);
        } else {
            let sim = token_set_similarity(&track.title_tokens, &file.title_tokens);
            if sim >= self.fuzzy.title {
                let points = scale_fuzzy(w.title_fuzzy_max, sim, self.fuzzy.title);
                if points > 0 {
                    fire(&mut breakdown, &mut raw, "title_fuzzy", points);
                }
            }
        }

        // Artist
        let artist_exact = !track.artist.is_empty() && track.artist.text == file.artist.text;
        if artist_exact {
            fire(&mut breakdown, &mut raw, "artist_exact", w.artist_exact);
        } else {
            let sim = token_set_similarity(&track.artist_tokens, &file.artist_tokens);
            if sim >= self.fuzzy.artist {
                fire(&mut breakdown, &mut raw, "artist_fuzzy", w.artist_fuzzy);
            }
        }

        // Album (only comparable when both sides carry one)
        let mut album_exact = false;
        if let (Some(track_album), Some(file_album)) = (&track.album, &file.album) {
            if !track_album.is_empty() && track_album.text == file_album.text {
                album_exact = true;
                fire(&mut breakdown, &mut raw, "album_exact", w.album_exact);
            } else {
                let sim = token_set_similarity(&track.album_tokens, &file.album_tokens);
                if sim >= self.fuzzy.album {
                    fire(&mut breakdown, &mut raw, "album_fuzzy", w.album_fuzzy);
                }
            }
        }

        // Year (exact or off by one)
        let mut year_conflict = false;
        if let (Some(track_year), Some(file_year)) = (track.track.year, file.file.year) {
            if (track_year - file_year).abs() <= 1 {
                fire(&mut breakdown, &mut raw, "year_match", w.year_match);
            } else {
                year_conflict = true;
            }
        }

        // Duration (tight wins over loose, mutually exclusive)
        let mut duration_conflict = false;
        if let (Some(track_ms), Some(file_ms)) = (track.track.duration_ms, file.file.duration_ms) {
            let diff = track_ms.abs_diff(file_ms);
            if diff <= DURATION_TIGHT_MS {
                fire(&mut breakdown, &mut raw, "duration_tight", w.duration_tight);
            } else if diff <= DURATION_LOOSE_MS {
                fire(&mut breakdown, &mut raw, "duration_loose", w.duration_loose);
                duration_conflict = true;
            } else {
                duration_conflict = true;
            }
        }

        // ISRC
        let track_isrc = track.track.isrc_trimmed();
        let file_isrc = file.file.isrc_trimmed();
        let mut isrc_conflict = false;
        if let (Some(a), Some(b)) = (track_isrc, file_isrc) {
            if a.eq_ignore_ascii_case(b) {
                fire(&mut breakdown, &mut raw, "isrc_match", w.isrc_match);
            } else {
                isrc_conflict = true;
            }
        }

        // Missing-metadata penalties: only when the counterpart has the field
        let mut penalized = false;
        if track.album.is_some() && file.album.is_none() {
            fire(&mut breakdown, &mut raw, "album_missing_local", w.album_missing_local);
            penalized = true;
        }
        if file.album.is_some() && track.album.is_none() {
            fire(&mut breakdown, &mut raw, "album_missing_remote", w.album_missing_remote);
            penalized = true;
        }
        if track.track.year.is_some() && file.file.year.is_none() {
            fire(&mut breakdown, &mut raw, "year_missing_local", w.year_missing);
            penalized = true;
        }
        if file.file.year.is_some() && track.track.year.is_none() {
            fire(&mut breakdown, &mut raw, "year_missing_remote", w.year_missing);
            penalized = true;
        }

        // Variant mismatch: exactly one side carries a Live/Remix/... marker
        let variant_mismatch = track.title.has_variant != file.title.has_variant;
        if variant_mismatch {
            fire(&mut breakdown, &mut raw, "variant_mismatch", w.variant_mismatch);
            penalized = true;
        }

        // Complete metadata poverty: nothing beyond title/artist/duration to
        // corroborate the link on either side
        if track.album.is_none()
            && file.album.is_none()
            && track.track.year.is_none()
            && file.file.year.is_none()
            && track_isrc.is_none()
            && file_isrc.is_none()
        {
            fire(&mut breakdown, &mut raw, "metadata_missing", w.metadata_missing);
            penalized = true;
        }

        // All comparable metadata matched exactly with nothing conflicting:
        // certain regardless of the numeric score
        let all_exact = title_exact
            && artist_exact
            && album_exact
            && !year_conflict
            && !duration_conflict
            && !isrc_conflict
            && !penalized;

        let confidence = if all_exact {
            Confidence::Certain
        } else {
            self.tiers.classify(raw)
        };

        PairScore {
            raw,
            confidence,
            breakdown,
        }
    }
}

/// Scale a fuzzy bonus linearly by similarity strength above the threshold.
fn scale_fuzzy(max_points: i32, sim: f64, threshold: f64) -> i32 {
    let strength = (sim - threshold) / (1.0 - threshold);
    (max_points as f64 * strength).round() as i32
}
