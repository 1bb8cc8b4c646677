//! Text normalization for metadata comparison
//!
//! All title/artist/album comparisons run over normalized text: case-folded,
//! punctuation stripped, whitespace collapsed, bracketed variant markers
//! ("(Live)", "[2009 Remaster]") removed but remembered as a separate
//! variant flag so the scorer can penalize variant mismatches.
//!
//! The same strings recur across many track/file comparisons, so results
//! are memoized in a bounded least-recently-used cache owned by the
//! `Normalizer` instance. Two instances (e.g. year-aware on/off) never
//! share cache entries.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};

use tunelink_common::{LocalFile, MatcherConfig, RemoteTrack};

/// Bracket contents containing one of these tokens mark a track variant
/// rather than part of the title proper.
const VARIANT_MARKERS: &[&str] = &[
    "live",
    "remix",
    "remixed",
    "remaster",
    "remastered",
    "acoustic",
    "edit",
    "demo",
    "instrumental",
    "unplugged",
    "karaoke",
    "mix",
    "version",
    "mono",
    "stereo",
    "deluxe",
    "single",
];

/// Normalization result: comparison text plus variant-marker presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub text: String,
    pub has_variant: bool,
}

impl Normalized {
    fn empty() -> Self {
        Self {
            text: String::new(),
            has_variant: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

type CacheKey = (String, Option<i32>);

struct CacheEntry {
    value: Normalized,
    last_access: u64,
}

/// Bounded memo cache with least-recently-used eviction.
struct BoundedCache {
    entries: HashMap<CacheKey, CacheEntry>,
    capacity: usize,
    clock: u64,
}

impl BoundedCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
            clock: 0,
        }
    }

    fn get(&mut self, key: &CacheKey) -> Option<Normalized> {
        self.clock += 1;
        let clock = self.clock;
        self.entries.get_mut(key).map(|entry| {
            entry.last_access = clock;
            entry.value.clone()
        })
    }

    fn insert(&mut self, key: CacheKey, value: Normalized) {
        while self.entries.len() >= self.capacity {
            self.evict_lru();
        }
        self.clock += 1;
        self.entries.insert(
            key,
            CacheEntry {
                value,
                last_access: self.clock,
            },
        );
    }

    fn evict_lru(&mut self) {
        let lru_key = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_access)
            .map(|(key, _)| key.clone());
        if let Some(key) = lru_key {
            self.entries.remove(&key);
        }
    }
}

/// Deterministic text normalizer with a bounded memo cache.
pub struct Normalizer {
    year_aware: bool,
    cache: RefCell<BoundedCache>,
}

impl Normalizer {
    pub fn new(config: &MatcherConfig) -> Self {
        Self {
            year_aware: config.year_aware_normalization,
            cache: RefCell::new(BoundedCache::new(config.normalizer_cache_capacity)),
        }
    }

    /// Normalize a metadata string.
    ///
    /// `year` is appended as an extra token only when the normalizer was
    /// configured year-aware; it is part of the cache key, so the same
    /// string with different years never aliases.
    pub fn normalize(&self, text: &str, year: Option<i32>) -> Normalized {
        let year_token = if self.year_aware { year } else { None };
        let key = (text.to_string(), year_token);
        if let Some(cached) = self.cache.borrow_mut().get(&key) {
            return cached;
        }
        let value = normalize_uncached(text, year_token);
        self.cache.borrow_mut().insert(key, value.clone());
        value
    }

    /// Normalize an optional metadata string; `None` yields empty text.
    pub fn normalize_opt(&self, text: Option<&str>, year: Option<i32>) -> Normalized {
        match text {
            Some(text) => self.normalize(text, year),
            None => Normalized::empty(),
        }
    }

    #[cfg(test)]
    fn cache_len(&self) -> usize {
        self.cache.borrow().entries.len()
    }
}

fn normalize_uncached(text: &str, year_token: Option<i32>) -> Normalized {
    let lower = text.to_lowercase();
    let (stripped, has_variant) = strip_variant_markers(&lower);
    let mut out = scrub(&stripped);
    if let Some(year) = year_token {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&year.to_string());
    }
    Normalized {
        text: out,
        has_variant,
    }
}

/// Remove bracketed segments, reporting whether any carried a variant
/// marker. Non-variant bracket contents are kept as plain words.
fn strip_variant_markers(text: &str) -> (String, bool) {
    let mut out = String::with_capacity(text.len());
    let mut bracket = String::new();
    let mut depth = 0usize;
    let mut has_variant = false;

    for ch in text.chars() {
        match ch {
            '(' | '[' => {
                if depth > 0 {
                    bracket.push(' ');
                }
                depth += 1;
            }
            ')' | ']' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if is_variant_marker(&bracket) {
                        has_variant = true;
                    } else {
                        out.push(' ');
                        out.push_str(&bracket);
                    }
                    bracket.clear();
                }
            }
            _ => {
                if depth > 0 {
                    bracket.push(ch);
                } else {
                    out.push(ch);
                }
            }
        }
    }

    // Unterminated bracket: treat the remainder as ordinary text
    if !bracket.is_empty() {
        out.push(' ');
        out.push_str(&bracket);
    }

    (out, has_variant)
}

fn is_variant_marker(content: &str) -> bool {
    content
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| VARIANT_MARKERS.contains(&token))
}

/// Drop punctuation and collapse whitespace. Apostrophes vanish without
/// leaving a word break ("it's" -> "its").
fn scrub(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(ch);
        } else if ch == '\'' || ch == '\u{2019}' {
            // apostrophe joins its word
        } else {
            pending_space = true;
        }
    }
    out
}

/// Ordered token set of a normalized string.
pub fn token_set(text: &str) -> BTreeSet<String> {
    text.split_whitespace().map(str::to_string).collect()
}

/// A remote track with normalization applied once up front.
#[derive(Debug)]
pub struct NormalizedTrack<'a> {
    pub track: &'a RemoteTrack,
    pub title: Normalized,
    pub artist: Normalized,
    pub album: Option<Normalized>,
    pub title_tokens: BTreeSet<String>,
    pub artist_tokens: BTreeSet<String>,
    pub album_tokens: BTreeSet<String>,
    /// Combined artist + title tokens for candidate prescoring
    pub prescore_tokens: HashSet<String>,
}

impl<'a> NormalizedTrack<'a> {
    pub fn new(normalizer: &Normalizer, track: &'a RemoteTrack) -> Self {
        let title = normalizer.normalize(&track.title, track.year);
        let artist = normalizer.normalize(&track.artist, None);
        let album = track
            .album_trimmed()
            .map(|album| normalizer.normalize(album, None));
        let title_tokens = token_set(&title.text);
        let artist_tokens = token_set(&artist.text);
        let album_tokens = album
            .as_ref()
            .map(|a| token_set(&a.text))
            .unwrap_or_default();
        let prescore_tokens = title_tokens
            .iter()
            .chain(artist_tokens.iter())
            .cloned()
            .collect();
        Self {
            track,
            title,
            artist,
            album,
            title_tokens,
            artist_tokens,
            album_tokens,
            prescore_tokens,
        }
    }
}

/// A local file with normalization and token sets computed once per file,
/// shared across every track comparison in an engine invocation.
#[derive(Debug)]
pub struct NormalizedFile<'a> {
    pub file: &'a LocalFile,
    pub title: Normalized,
    pub artist: Normalized,
    pub album: Option<Normalized>,
    pub title_tokens: BTreeSet<String>,
    pub artist_tokens: BTreeSet<String>,
    pub album_tokens: BTreeSet<String>,
    /// Combined artist + title tokens for candidate prescoring
    pub prescore_tokens: HashSet<String>,
}

impl<'a> NormalizedFile<'a> {
    pub fn new(normalizer: &Normalizer, file: &'a LocalFile) -> Self {
        let title = normalizer.normalize(&file.title, file.year);
        let artist = normalizer.normalize(&file.artist, None);
        let album = file
            .album_trimmed()
            .map(|album| normalizer.normalize(album, None));
        let title_tokens = token_set(&title.text);
        let artist_tokens = token_set(&artist.text);
        let album_tokens = album
            .as_ref()
            .map(|a| token_set(&a.text))
            .unwrap_or_default();
        let prescore_tokens = title_tokens
            .iter()
            .chain(artist_tokens.iter())
            .cloned()
            .collect();
        Self {
            file,
            title,
            artist,
            album,
            title_tokens,
            artist_tokens,
            album_tokens,
            prescore_tokens,
        }
    }
}
