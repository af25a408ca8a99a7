//! Canonical song records normalized from recognizer responses.
//!
//! Each recognition back-end returns its own JSON shape; this module maps
//! both into a single [`Song`] record and provides the identity predicate
//! used for duplicate suppression.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;

/// A recognizer response that is missing one of the required fields
/// (title, album, at least one artist).
#[derive(Debug, Error)]
#[error("malformed recognition result: {0}")]
pub struct MalformedRecognitionResult(pub String);

/// Which back-end produced a recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognizerKind {
    Primary,
    Secondary,
}

impl std::fmt::Display for RecognizerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecognizerKind::Primary => write!(f, "primary"),
            RecognizerKind::Secondary => write!(f, "secondary"),
        }
    }
}

/// A recognized track. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub title: String,
    pub album: String,
    /// Ordered: \[main artist, featured artists...\] as reported by the back-end.
    pub artists: Vec<String>,
    pub genres: BTreeSet<String>,
    pub recognizer: RecognizerKind,
}

impl Song {
    /// Two songs are the same iff title, album and artists match.
    /// Genres and the reporting recognizer are deliberately excluded:
    /// back-ends disagree on genre taxonomies, and the same track may be
    /// identified by either back-end across consecutive samples.
    pub fn same_song(&self, other: &Song) -> bool {
        self.title == other.title && self.album == other.album && self.artists == other.artists
    }
}

/// Normalize a raw recognizer response into a [`Song`].
pub fn normalize(raw: &Value, kind: RecognizerKind) -> Result<Song, MalformedRecognitionResult> {
    match kind {
        RecognizerKind::Primary => normalize_primary(raw),
        RecognizerKind::Secondary => normalize_secondary(raw),
    }
}

/// Primary back-end shape: a flat document with `artist`, `album`, `track`.
fn normalize_primary(raw: &Value) -> Result<Song, MalformedRecognitionResult> {
    let title = require_string(raw, "track")?;
    let album = require_string(raw, "album")?;
    let artist = require_string(raw, "artist")?;

    Ok(Song {
        title,
        album,
        artists: vec![artist],
        genres: BTreeSet::new(),
        recognizer: RecognizerKind::Primary,
    })
}

/// Secondary back-end shape: `title`, `album.name`, `artists[].name` and
/// optional `genres[].name`.
fn normalize_secondary(raw: &Value) -> Result<Song, MalformedRecognitionResult> {
    let title = require_string(raw, "title")?;

    let album = raw
        .get("album")
        .and_then(|album| album.get("name"))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| MalformedRecognitionResult("missing field 'album.name'".to_owned()))?;

    let artists: Vec<String> = raw
        .get("artists")
        .and_then(Value::as_array)
        .map(|artists| artists.iter().filter_map(name_of).collect())
        .unwrap_or_default();
    if artists.is_empty() {
        return Err(MalformedRecognitionResult(
            "missing field 'artists[].name'".to_owned(),
        ));
    }

    let genres: BTreeSet<String> = raw
        .get("genres")
        .and_then(Value::as_array)
        .map(|genres| genres.iter().filter_map(name_of).collect())
        .unwrap_or_default();

    Ok(Song {
        title,
        album,
        artists,
        genres,
        recognizer: RecognizerKind::Secondary,
    })
}

fn require_string(raw: &Value, key: &str) -> Result<String, MalformedRecognitionResult> {
    raw.get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| MalformedRecognitionResult(format!("missing field '{}'", key)))
}

fn name_of(value: &Value) -> Option<String> {
    value.get("name").and_then(Value::as_str).map(str::to_owned)
}
