//! End-to-end tests of the matching engine over its public API

use tokio_util::sync::CancellationToken;
use tunelink_common::{Confidence, LocalFile, MatchRecord, MatcherConfig, RemoteTrack};
use tunelink_matcher::{MatchOptions, MatchingEngine};

fn engine() -> MatchingEngine {
    MatchingEngine::new(MatcherConfig::default()).unwrap()
}

fn track(id: &str, title: &str, artist: &str) -> RemoteTrack {
    RemoteTrack {
        id: id.to_string(),
        provider: "spotify".to_string(),
        title: title.to_string(),
        artist: artist.to_string(),
        album: None,
        duration_ms: None,
        year: None,
        isrc: None,
    }
}

fn file(id: i64, title: &str, artist: &str) -> LocalFile {
    LocalFile {
        id,
        path: format!("music/{}.flac", id),
        title: title.to_string(),
        artist: artist.to_string(),
        album: String::new(),
        duration_ms: None,
        bitrate: None,
        year: None,
        isrc: None,
    }
}

#[test]
fn test_come_together_scenario_emits_low_confidence_record() {
    let tracks = vec![RemoteTrack {
        duration_ms: Some(259_000),
        isrc: Some("GBAYE0601690".to_string()),
        ..track("t1", "Come Together", "The Beatles")
    }];
    let files = vec![LocalFile {
        duration_ms: Some(259_500),
        ..file(1, "come together", "beatles, the")
    }];

    let outcome = engine().match_all(&tracks, &files, &[], MatchOptions::default());

    assert!(outcome.completed);
    assert_eq!(outcome.records.len(), 1);
    let record = &outcome.records[0];
    assert_eq!(record.track_id, "t1");
    assert_eq!(record.file_id, 1);
    assert_eq!(record.score, 71);
    assert_eq!(record.confidence, Confidence::Low);
    assert!(!record.is_manual);
}

#[test]
fn test_disjoint_metadata_leaves_track_unmatched() {
    let tracks = vec![track("t1", "Paranoid Android", "Radiohead")];
    let files = vec![file(1, "Blue in Green", "Miles Davis")];

    let outcome = engine().match_all(&tracks, &files, &[], MatchOptions::default());

    assert!(outcome.records.is_empty());
    assert_eq!(outcome.stats.unmatched, 1);
}

#[test]
fn test_match_all_is_idempotent() {
    let tracks = vec![
        RemoteTrack {
            duration_ms: Some(259_000),
            ..track("t1", "Come Together", "The Beatles")
        },
        track("t2", "Something", "The Beatles"),
        track("t3", "Nowhere To Be Found", "Nobody"),
    ];
    let files = vec![
        LocalFile {
            duration_ms: Some(259_400),
            ..file(1, "Come Together", "The Beatles")
        },
        file(2, "Something", "The Beatles"),
    ];

    let e = engine();
    let first = e.match_all(&tracks, &files, &[], MatchOptions::default());
    let second = e.match_all(&tracks, &files, &[], MatchOptions::default());
    assert_eq!(first.records, second.records);
}

#[test]
fn test_incremental_track_matching_equals_full_run_restricted() {
    let tracks = vec![
        RemoteTrack {
            album: Some("Abbey Road".to_string()),
            ..track("t1", "Come Together", "The Beatles")
        },
        RemoteTrack {
            album: Some("Abbey Road".to_string()),
            ..track("t2", "Something", "The Beatles")
        },
    ];
    let files = vec![
        LocalFile {
            album: "Abbey Road".to_string(),
            ..file(1, "Come Together", "The Beatles")
        },
        LocalFile {
            album: "Abbey Road".to_string(),
            ..file(2, "Something", "The Beatles")
        },
    ];

    let e = engine();
    let full = e.match_all(&tracks, &files, &[], MatchOptions::default());
    let incremental =
        e.match_changed_tracks(&tracks[1..], &files, &[], MatchOptions::default());

    let full_for_t2: Vec<&MatchRecord> = full
        .records
        .iter()
        .filter(|r| r.track_id == "t2")
        .collect();
    assert_eq!(incremental.records.len(), full_for_t2.len());
    assert_eq!(&incremental.records[0], full_for_t2[0]);
}

#[test]
fn test_incremental_file_matching_restricts_file_domain() {
    let tracks = vec![RemoteTrack {
        album: Some("Abbey Road".to_string()),
        ..track("t1", "Come Together", "The Beatles")
    }];
    let files = vec![LocalFile {
        album: "Abbey Road".to_string(),
        ..file(1, "Come Together", "The Beatles")
    }];
    let changed: Vec<LocalFile> = Vec::new();

    let e = engine();
    // Restricting to an empty changed-file set leaves everything unmatched
    let outcome = e.match_changed_files(&tracks, &changed, &[], MatchOptions::default());
    assert!(outcome.records.is_empty());

    let outcome = e.match_changed_files(&tracks, &files, &[], MatchOptions::default());
    assert_eq!(outcome.records.len(), 1);
}

#[test]
fn test_manual_override_is_never_touched() {
    let tracks = vec![track("t1", "Come Together", "The Beatles")];
    let files = vec![file(1, "Come Together", "The Beatles")];
    let existing = vec![MatchRecord {
        track_id: "t1".to_string(),
        provider: "spotify".to_string(),
        file_id: 99,
        score: 0,
        confidence: Confidence::Low,
        is_manual: true,
    }];

    let outcome = engine().match_all(&tracks, &files, &existing, MatchOptions::default());

    assert!(outcome.records.is_empty());
    assert_eq!(outcome.stats.skipped_manual, 1);
}

#[test]
fn test_rematch_replaces_automatic_result() {
    // Merge policy: the latest computation wins for automatic matches;
    // only manual records are protected. An earlier automatic record
    // pointing elsewhere does not pin the track.
    let tracks = vec![RemoteTrack {
        album: Some("Abbey Road".to_string()),
        ..track("t1", "Come Together", "The Beatles")
    }];
    let files = vec![LocalFile {
        album: "Abbey Road".to_string(),
        ..file(1, "Come Together", "The Beatles")
    }];
    let existing = vec![MatchRecord {
        track_id: "t1".to_string(),
        provider: "spotify".to_string(),
        file_id: 42,
        score: 120,
        confidence: Confidence::Certain,
        is_manual: false,
    }];

    let outcome = engine().match_all(&tracks, &files, &existing, MatchOptions::default());

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0].file_id, 1);
}

#[test]
fn test_precancelled_run_returns_empty_partial_result() {
    let tracks = vec![track("t1", "Come Together", "The Beatles")];
    let files = vec![file(1, "Come Together", "The Beatles")];
    let token = CancellationToken::new();
    token.cancel();

    let outcome = engine().match_all(
        &tracks,
        &files,
        &[],
        MatchOptions {
            cancel: Some(&token),
            ..Default::default()
        },
    );

    assert!(!outcome.completed);
    assert_eq!(outcome.processed, 0);
    assert!(outcome.records.is_empty());
}

#[test]
fn test_cancellation_mid_batch_keeps_finished_records() {
    let config = MatcherConfig {
        progress_interval: 1,
        ..Default::default()
    };
    let e = MatchingEngine::new(config).unwrap();

    let tracks: Vec<RemoteTrack> = (0..6)
        .map(|i| RemoteTrack {
            isrc: Some(format!("USRC1760{:04}", i)),
            ..track(&format!("t{}", i), &format!("Song {}", i), "Artist")
        })
        .collect();
    let files: Vec<LocalFile> = (0..6)
        .map(|i| LocalFile {
            isrc: Some(format!("USRC1760{:04}", i)),
            ..file(i, &format!("Song {}", i), "Artist")
        })
        .collect();

    let token = CancellationToken::new();
    let trigger = token.clone();
    let mut cancel_after_two = |processed: usize, _total: usize| {
        if processed == 2 {
            trigger.cancel();
        }
    };

    let outcome = e.match_all(
        &tracks,
        &files,
        &[],
        MatchOptions {
            progress: Some(&mut cancel_after_two),
            cancel: Some(&token),
        },
    );

    assert!(!outcome.completed);
    assert_eq!(outcome.processed, 2);
    // Records produced before cancellation are complete and usable
    assert_eq!(outcome.records.len(), 2);
    for record in &outcome.records {
        assert!(record.confidence.is_match());
    }
}

#[test]
fn test_progress_reported_at_interval_only() {
    let config = MatcherConfig {
        progress_interval: 4,
        ..Default::default()
    };
    let e = MatchingEngine::new(config).unwrap();

    let tracks: Vec<RemoteTrack> = (0..10)
        .map(|i| track(&format!("t{}", i), &format!("Song {}", i), "Artist"))
        .collect();
    let files: Vec<LocalFile> = Vec::new();

    let mut calls: Vec<(usize, usize)> = Vec::new();
    let mut record_call = |processed: usize, total: usize| calls.push((processed, total));

    e.match_all(
        &tracks,
        &files,
        &[],
        MatchOptions {
            progress: Some(&mut record_call),
            ..Default::default()
        },
    );

    assert_eq!(calls, vec![(4, 10), (8, 10), (10, 10)]);
}

#[test]
fn test_certain_match_selects_fully_exact_file() {
    let tracks = vec![RemoteTrack {
        album: Some("Abbey Road".to_string()),
        year: Some(1969),
        duration_ms: Some(259_000),
        ..track("t1", "Come Together", "The Beatles")
    }];
    let mut files: Vec<LocalFile> = (0..50)
        .map(|i| file(i, &format!("Other Song {}", i), "Other Artist"))
        .collect();
    files.push(LocalFile {
        album: "Abbey Road".to_string(),
        year: Some(1969),
        duration_ms: Some(259_200),
        ..file(100, "Come Together", "The Beatles")
    });

    let outcome = engine().match_all(&tracks, &files, &[], MatchOptions::default());

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0].file_id, 100);
    assert_eq!(outcome.records[0].confidence, Confidence::Certain);
}

#[test]
fn test_duplicate_tracks_emit_single_record() {
    let t = RemoteTrack {
        album: Some("Abbey Road".to_string()),
        ..track("t1", "Come Together", "The Beatles")
    };
    let tracks = vec![t.clone(), t];
    let files = vec![LocalFile {
        album: "Abbey Road".to_string(),
        ..file(1, "Come Together", "The Beatles")
    }];

    let outcome = engine().match_all(&tracks, &files, &[], MatchOptions::default());
    assert_eq!(outcome.records.len(), 1);
}

#[test]
fn test_empty_batches() {
    let e = engine();
    let outcome = e.match_all(&[], &[], &[], MatchOptions::default());
    assert!(outcome.completed);
    assert!(outcome.records.is_empty());
    assert_eq!(outcome.total, 0);

    let tracks = vec![track("t1", "Come Together", "The Beatles")];
    let outcome = e.match_all(&tracks, &[], &[], MatchOptions::default());
    assert!(outcome.records.is_empty());
    assert_eq!(outcome.stats.unmatched, 1);
}

#[test]
fn test_duration_prefilter_excludes_far_candidates() {
    let e = engine();
    let t = RemoteTrack {
        duration_ms: Some(200_000),
        ..track("t1", "Come Together", "The Beatles")
    };
    let files = vec![
        LocalFile {
            duration_ms: Some(203_000),
            ..file(1, "Come Together", "The Beatles")
        },
        LocalFile {
            duration_ms: Some(260_000),
            ..file(2, "Come Together", "The Beatles")
        },
    ];

    let reports = e.explain_track(&t, &files, 10);
    let ids: Vec<i64> = reports.iter().map(|r| r.file_id).collect();
    assert_eq!(ids, vec![1]);
}

#[test]
fn test_explain_track_orders_and_serializes() {
    let e = engine();
    let t = track("t1", "Come Together", "The Beatles");
    let files = vec![
        file(1, "Come Together", "The Beatles"),
        file(2, "Come Along", "The Beatles"),
        file(3, "Unrelated", "Nobody"),
    ];

    let reports = e.explain_track(&t, &files, 2);
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].file_id, 1);
    assert!(reports[0].score.raw >= reports[1].score.raw);
    assert!(reports[0]
        .score
        .breakdown
        .points_for("title_exact")
        .is_some());

    // Diagnostics serialize for the reporting collaborator
    let json = serde_json::to_string(&reports).unwrap();
    assert!(json.contains("title_exact"));
}

#[test]
fn test_year_aware_normalization_changes_matching() {
    // Year-aware: same title with different years no longer compares equal
    let config = MatcherConfig {
        year_aware_normalization: true,
        ..Default::default()
    };
    let e = MatchingEngine::new(config).unwrap();
    let t = RemoteTrack {
        year: Some(1969),
        ..track("t1", "Come Together", "The Beatles")
    };
    let files = vec![LocalFile {
        year: Some(1983),
        ..file(1, "Come Together", "The Beatles")
    }];

    let reports = e.explain_track(&t, &files, 1);
    assert!(reports[0].score.breakdown.points_for("title_exact").is_none());
}
