//! Candidate selection: narrowing the local-file pool per remote track
//!
//! Fuzzy scoring every (track, file) pair is quadratic in library size.
//! The selector bounds the work per track in two passes: a cheap duration
//! prefilter, then Jaccard token-overlap prescoring that keeps only the
//! top `max_candidates_per_track` files.

use std::collections::HashSet;

use tracing::debug;
use tunelink_common::{MatcherConfig, RemoteTrack};

use crate::normalizer::{NormalizedFile, NormalizedTrack};

/// Duration window never narrows below +/-4 seconds, regardless of the
/// configured tolerance.
const MIN_WINDOW_MS: u32 = 4_000;

/// Jaccard similarity of two token sets. Two empty sets have similarity 0.0.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// Narrows the full local-file set to a bounded candidate set per track.
pub struct CandidateSelector {
    window_ms: u32,
    max_candidates: usize,
}

impl CandidateSelector {
    pub fn new(config: &MatcherConfig) -> Self {
        let tolerance_ms = (config.duration_tolerance_secs * 2.0 * 1000.0) as u32;
        Self {
            window_ms: tolerance_ms.max(MIN_WINDOW_MS),
            max_candidates: config.max_candidates_per_track,
        }
    }

    /// Effective duration window in milliseconds.
    pub fn window_ms(&self) -> u32 {
        self.window_ms
    }

    /// Keep files whose duration lies within the window of the track's.
    ///
    /// Files without duration metadata cannot be excluded safely and always
    /// pass. A track without duration returns the set unchanged.
    pub fn duration_prefilter<'f, 'a>(
        &self,
        track: &RemoteTrack,
        files: &'f [NormalizedFile<'a>],
    ) -> Vec<&'f NormalizedFile<'a>> {
        let Some(track_ms) = track.duration_ms else {
            return files.iter().collect();
        };
        files
            .iter()
            .filter(|file| match file.file.duration_ms {
                Some(file_ms) => track_ms.abs_diff(file_ms) <= self.window_ms,
                None => true,
            })
            .collect()
    }

    /// Keep the `max_candidates` files with the highest token overlap.
    ///
    /// Skips the sort entirely when the set is already small enough. Ties
    /// break on ascending file id so repeated runs select identically.
    pub fn token_prescore<'f, 'a>(
        &self,
        track: &NormalizedTrack,
        files: Vec<&'f NormalizedFile<'a>>,
    ) -> Vec<&'f NormalizedFile<'a>> {
        if files.len() <= self.max_candidates {
            return files;
        }
        let mut scored: Vec<(f64, &'f NormalizedFile<'a>)> = files
            .into_iter()
            .map(|file| (jaccard(&track.prescore_tokens, &file.prescore_tokens), file))
            .collect();
        scored.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then_with(|| a.1.file.id.cmp(&b.1.file.id))
        });
        scored.truncate(self.max_candidates);
        scored.into_iter().map(|(_, file)| file).collect()
    }

    /// Full selection pipeline: prefilter, fall back to the unfiltered set
    /// when the prefilter removes every candidate, then prescore.
    pub fn select<'f, 'a>(
        &self,
        track: &NormalizedTrack,
        files: &'f [NormalizedFile<'a>],
    ) -> Vec<&'f NormalizedFile<'a>> {
        if files.is_empty() {
            return Vec::new();
        }
        let mut filtered = self.duration_prefilter(track.track, files);
        if filtered.is_empty() {
            debug!(
                track_id = %track.track.id,
                "duration prefilter removed all candidates, falling back to full set"
            );
            filtered = files.iter().collect();
        }
        self.token_prescore(track, filtered)
    }
}
