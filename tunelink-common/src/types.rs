//! Data model shared between the matching engine and its collaborators.
//!
//! `RemoteTrack` records arrive from the ingestion collaborator (provider
//! API pull), `LocalFile` records from the library-scan collaborator (tag
//! extraction). Both are read-only inputs to the engine. `MatchRecord` is
//! the only output entity that survives an engine invocation; it is owned
//! by the persistence collaborator.

use serde::{Deserialize, Serialize};

/// Confidence tier for a track/file link.
///
/// Ordered: `Rejected < Low < Medium < High < Certain`. `Rejected` means
/// "no match" and never produces a `MatchRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Confidence {
    Rejected,
    Low,
    Medium,
    High,
    Certain,
}

impl Confidence {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Rejected => "Rejected",
            Confidence::Low => "Low",
            Confidence::Medium => "Medium",
            Confidence::High => "High",
            Confidence::Certain => "Certain",
        }
    }

    /// True for any tier that produces a `MatchRecord`.
    pub fn is_match(&self) -> bool {
        *self >= Confidence::Low
    }
}

/// A track record from a streaming provider.
///
/// Created once per ingestion; never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTrack {
    /// Provider-scoped track identifier
    pub id: String,
    /// Provider name (match records are keyed by `(id, provider)`)
    pub provider: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_ms: Option<u32>,
    pub year: Option<i32>,
    /// International Standard Recording Code, if the provider exposes one
    pub isrc: Option<String>,
}

impl RemoteTrack {
    /// ISRC if present and non-empty
    pub fn isrc_trimmed(&self) -> Option<&str> {
        self.isrc.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Album if present and non-empty
    pub fn album_trimmed(&self) -> Option<&str> {
        self.album.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// A music file from the local library scan.
///
/// Tag fields use the empty string for a missing tag, matching what tag
/// extractors report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalFile {
    /// Library-scoped file identifier
    pub id: i64,
    pub path: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_ms: Option<u32>,
    pub bitrate: Option<u32>,
    pub year: Option<i32>,
    /// ISRC from file tags, if present
    pub isrc: Option<String>,
}

impl LocalFile {
    /// ISRC if present and non-empty
    pub fn isrc_trimmed(&self) -> Option<&str> {
        self.isrc.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Album tag if non-empty
    pub fn album_trimmed(&self) -> Option<&str> {
        let album = self.album.trim();
        if album.is_empty() {
            None
        } else {
            Some(album)
        }
    }
}

/// A confidence-scored link between a remote track and a local file.
///
/// At most one automatic record is active per `(track_id, provider)`.
/// A manual record always takes precedence and is never overwritten by
/// the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub track_id: String,
    pub provider: String,
    pub file_id: i64,
    pub score: i32,
    pub confidence: Confidence,
    pub is_manual: bool,
}
