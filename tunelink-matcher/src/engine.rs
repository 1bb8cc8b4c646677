//! Batch matching orchestration
//!
//! Runs the selector and scorer over a batch of remote tracks, picking the
//! best candidate file per track and emitting a `MatchRecord` for every
//! link at or above Low confidence. Supports incremental re-matching on a
//! changed subset, progress reporting, cooperative cancellation, and
//! pull-based per-track diagnostics.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tunelink_common::{Confidence, LocalFile, MatchRecord, MatcherConfig, RemoteTrack, Result};

use crate::normalizer::{NormalizedFile, NormalizedTrack, Normalizer};
use crate::scoring::{PairScore, ScoringEngine};
use crate::selector::CandidateSelector;

/// Per-invocation knobs: progress callback and cancellation signal.
#[derive(Default)]
pub struct MatchOptions<'a> {
    /// Invoked with (processed, total) every `progress_interval` tracks
    pub progress: Option<&'a mut dyn FnMut(usize, usize)>,
    /// Checked between tracks, never mid-score
    pub cancel: Option<&'a CancellationToken>,
}

/// Per-tier counts for one matching run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchStats {
    pub total_tracks: usize,
    pub certain: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub unmatched: usize,
    pub skipped_manual: usize,
}

/// Result of one matching run.
///
/// `completed` is false when the run was cancelled; `records` then holds
/// everything produced before the cancellation point, each internally
/// consistent.
#[derive(Debug)]
pub struct MatchOutcome {
    pub records: Vec<MatchRecord>,
    pub stats: MatchStats,
    pub processed: usize,
    pub total: usize,
    pub completed: bool,
}

/// One scored candidate for diagnostic inspection.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CandidateReport {
    pub file_id: i64,
    pub path: String,
    pub score: PairScore,
}

/// Orchestrates candidate selection and scoring over track batches.
pub struct MatchingEngine {
    config: MatcherConfig,
    normalizer: Normalizer,
    selector: CandidateSelector,
    scorer: ScoringEngine,
}

impl MatchingEngine {
    /// Build an engine from a validated configuration.
    ///
    /// # Errors
    /// Returns a configuration error when the config fails validation;
    /// the engine refuses to run with nonsensical values.
    pub fn new(config: MatcherConfig) -> Result<Self> {
        config.validate()?;
        let normalizer = Normalizer::new(&config);
        let selector = CandidateSelector::new(&config);
        let scorer = ScoringEngine::new(&config);
        Ok(Self {
            config,
            normalizer,
            selector,
            scorer,
        })
    }

    /// Match every track against the file set.
    ///
    /// Tracks carrying a manual record in `existing` are never touched.
    /// Automatic records in `existing` are ignored: the latest computation
    /// wins and the persistence collaborator replaces them on upsert.
    pub fn match_all(
        &self,
        tracks: &[RemoteTrack],
        files: &[LocalFile],
        existing: &[MatchRecord],
        mut options: MatchOptions,
    ) -> MatchOutcome {
        let manual: HashSet<(&str, &str)> = existing
            .iter()
            .filter(|r| r.is_manual)
            .map(|r| (r.track_id.as_str(), r.provider.as_str()))
            .collect();

        // Normalize every file once; shared read-only across all tracks
        let file_index: Vec<NormalizedFile> = files
            .iter()
            .map(|file| NormalizedFile::new(&self.normalizer, file))
            .collect();

        let total = tracks.len();
        let mut stats = MatchStats {
            total_tracks: total,
            ..Default::default()
        };
        let mut records = Vec::new();
        let mut seen: HashSet<(&str, &str)> = HashSet::new();
        let mut processed = 0usize;
        let mut last_reported = 0usize;
        let mut completed = true;

        for track in tracks {
            if options.cancel.map(|c| c.is_cancelled()).unwrap_or(false) {
                debug!(processed, total, "matching cancelled between tracks");
                completed = false;
                break;
            }

            let key = (track.id.as_str(), track.provider.as_str());
            if manual.contains(&key) {
                debug!(track_id = %track.id, "skipping track with manual match");
                stats.skipped_manual += 1;
            } else if !seen.insert(key) {
                debug!(track_id = %track.id, "skipping duplicate track in batch");
            } else {
                match self.match_track(track, &file_index) {
                    Some(record) => {
                        match record.confidence {
                            Confidence::Certain => stats.certain += 1,
                            Confidence::High => stats.high += 1,
                            Confidence::Medium => stats.medium += 1,
                            _ => stats.low += 1,
                        }
                        records.push(record);
                    }
                    None => stats.unmatched += 1,
                }
            }

            processed += 1;
            if processed % self.config.progress_interval == 0 {
                if let Some(progress) = options.progress.as_mut() {
                    progress(processed, total);
                }
                last_reported = processed;
            }
        }

        if processed != last_reported {
            if let Some(progress) = options.progress.as_mut() {
                progress(processed, total);
            }
        }

        info!(
            total,
            certain = stats.certain,
            high = stats.high,
            medium = stats.medium,
            low = stats.low,
            unmatched = stats.unmatched,
            skipped_manual = stats.skipped_manual,
            completed,
            "matching run finished"
        );

        MatchOutcome {
            records,
            stats,
            processed,
            total,
            completed,
        }
    }

    /// Re-match a changed subset of tracks against the full file set.
    ///
    /// Same pure computation as [`match_all`](Self::match_all), applied to
    /// the smaller track domain; not an approximation.
    pub fn match_changed_tracks(
        &self,
        changed_tracks: &[RemoteTrack],
        all_files: &[LocalFile],
        existing: &[MatchRecord],
        options: MatchOptions,
    ) -> MatchOutcome {
        self.match_all(changed_tracks, all_files, existing, options)
    }

    /// Re-match all tracks against a changed subset of files.
    ///
    /// Same pure computation as [`match_all`](Self::match_all), applied to
    /// the smaller file domain.
    pub fn match_changed_files(
        &self,
        all_tracks: &[RemoteTrack],
        changed_files: &[LocalFile],
        existing: &[MatchRecord],
        options: MatchOptions,
    ) -> MatchOutcome {
        self.match_all(all_tracks, changed_files, existing, options)
    }

    /// Score the top candidates for one track, for diagnostics.
    ///
    /// Pull-based: scores every selected candidate (no early exit) and
    /// returns the best `top_n` with full breakdowns.
    pub fn explain_track(
        &self,
        track: &RemoteTrack,
        files: &[LocalFile],
        top_n: usize,
    ) -> Vec<CandidateReport> {
        let file_index: Vec<NormalizedFile> = files
            .iter()
            .map(|file| NormalizedFile::new(&self.normalizer, file))
            .collect();
        let normalized = NormalizedTrack::new(&self.normalizer, track);
        let mut reports: Vec<CandidateReport> = self
            .selector
            .select(&normalized, &file_index)
            .into_iter()
            .map(|candidate| CandidateReport {
                file_id: candidate.file.id,
                path: candidate.file.path.clone(),
                score: self.scorer.score(&normalized, candidate),
            })
            .collect();
        reports.sort_by(|a, b| {
            b.score
                .raw
                .cmp(&a.score.raw)
                .then_with(|| a.file_id.cmp(&b.file_id))
        });
        reports.truncate(top_n);
        reports
    }

    /// Find the best-scoring candidate file for one track.
    ///
    /// Stops scoring as soon as a Certain candidate appears; no higher tier
    /// exists. Returns None when the best candidate stays below Low.
    fn match_track(&self, track: &RemoteTrack, file_index: &[NormalizedFile]) -> Option<MatchRecord> {
        let normalized = NormalizedTrack::new(&self.normalizer, track);
        if normalized.title.is_empty() && normalized.artist.is_empty() {
            debug!(track_id = %track.id, "skipping track without usable metadata");
            return None;
        }

        let candidates = self.selector.select(&normalized, file_index);
        let mut best: Option<(PairScore, &NormalizedFile)> = None;

        for candidate in candidates {
            if candidate.title.is_empty() && candidate.artist.is_empty() {
                debug!(
                    file_id = candidate.file.id,
                    path = %candidate.file.path,
                    "skipping candidate without normalized text"
                );
                continue;
            }

            let score = self.scorer.score(&normalized, candidate);
            let better = match &best {
                None => true,
                Some((best_score, best_file)) => {
                    (score.confidence, score.raw) > (best_score.confidence, best_score.raw)
                        || (score.confidence == best_score.confidence
                            && score.raw == best_score.raw
                            && prefer_file(candidate.file, best_file.file))
                }
            };
            if better {
                let certain = score.confidence == Confidence::Certain;
                best = Some((score, candidate));
                if certain {
                    break;
                }
            }
        }

        let (score, file) = best?;
        if !score.confidence.is_match() {
            debug!(
                track_id = %track.id,
                best_score = score.raw,
                breakdown = %score.breakdown.summary(),
                "no candidate cleared the confidence threshold"
            );
            return None;
        }

        debug!(
            track_id = %track.id,
            file_id = file.file.id,
            score = score.raw,
            confidence = score.confidence.as_str(),
            "matched track"
        );

        Some(MatchRecord {
            track_id: track.id.clone(),
            provider: track.provider.clone(),
            file_id: file.file.id,
            score: score.raw,
            confidence: score.confidence,
            is_manual: false,
        })
    }
}

/// Tie-break between equally scored candidates: prefer the higher-bitrate
/// file, then the lower file id, so repeated runs pick identically.
fn prefer_file(candidate: &LocalFile, incumbent: &LocalFile) -> bool {
    let candidate_rate = candidate.bitrate.unwrap_or(0);
    let incumbent_rate = incumbent.bitrate.unwrap_or(0);
    candidate_rate > incumbent_rate
        || (candidate_rate == incumbent_rate && candidate.id < incumbent.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: i64, bitrate: Option<u32>) -> LocalFile {
        LocalFile {
            id,
            path: format!("music/{}.flac", id),
            title: "Track".to_string(),
            artist: "Artist".to_string(),
            album: String::new(),
            duration_ms: None,
            bitrate,
            year: None,
            isrc: None,
        }
    }

    #[test]
    fn test_tie_break_prefers_higher_bitrate() {
        assert!(prefer_file(&file(2, Some(320)), &file(1, Some(128))));
        assert!(!prefer_file(&file(2, Some(128)), &file(1, Some(320))));
    }

    #[test]
    fn test_tie_break_prefers_lower_id_at_equal_bitrate() {
        assert!(prefer_file(&file(1, Some(320)), &file(2, Some(320))));
        assert!(!prefer_file(&file(2, None), &file(1, None)));
    }

    #[test]
    fn test_engine_rejects_invalid_config() {
        let config = MatcherConfig {
            max_candidates_per_track: 0,
            ..Default::default()
        };
        assert!(MatchingEngine::new(config).is_err());
    }
}
