//! Sample records held by the store and their on-disk sidecar shape.

use crate::song::{self, RecognizerKind, Song};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// A successful identification: the canonical song plus the raw back-end
/// payload it was normalized from. The raw payload is what sidecar files
/// persist, so a restart re-normalizes instead of trusting derived data.
#[derive(Debug, Clone)]
pub struct Recognition {
    pub song: Song,
    pub raw: Value,
}

/// Metadata attached to one ingested sample. Every field is best-effort;
/// a sample with no recognition and no analysis results is still valid.
#[derive(Debug, Clone, Default)]
pub struct SampleMetadata {
    pub recognized_song: Option<Recognition>,
    pub duration_secs: Option<f64>,
    pub bpm: Option<f64>,
    pub hidden: bool,
    pub keep_unrecognized_on_hide: bool,
}

impl SampleMetadata {
    pub fn is_recognized(&self) -> bool {
        self.recognized_song.is_some()
    }

    pub fn song(&self) -> Option<&Song> {
        self.recognized_song.as_ref().map(|recognition| &recognition.song)
    }
}

/// One audio clip captured from a source. The id doubles as the capture
/// time, seconds since the Unix epoch.
#[derive(Debug, Clone)]
pub struct Sample {
    pub id: u64,
    pub source_id: String,
    pub metadata: SampleMetadata,
}

impl Sample {
    pub fn audio_file_name(&self) -> String {
        format!("{}.mp3", self.id)
    }

    /// Capture time rendered as ISO-8601 UTC, e.g. `2024-03-01T18:30:00Z`.
    pub fn readable_date(&self) -> String {
        chrono::DateTime::from_timestamp(self.id as i64, 0)
            .map(|date| date.format("%Y-%m-%dT%H:%M:%SZ").to_string())
            .unwrap_or_default()
    }
}

/// Serialized sidecar layout. The raw recognizer payload sits under a
/// per-back-end key so the file reflects what the back-end actually said.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub(super) struct SidecarFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gracenote: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recognized_song: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bpm: Option<f64>,
    pub hidden: bool,
    pub keep_unrecognized_on_hide: bool,
}

impl SidecarFile {
    pub fn from_metadata(metadata: &SampleMetadata) -> Self {
        let mut file = SidecarFile {
            duration: metadata.duration_secs,
            bpm: metadata.bpm,
            hidden: metadata.hidden,
            keep_unrecognized_on_hide: metadata.keep_unrecognized_on_hide,
            ..Default::default()
        };
        if let Some(recognition) = &metadata.recognized_song {
            match recognition.song.recognizer {
                RecognizerKind::Primary => file.gracenote = Some(recognition.raw.clone()),
                RecognizerKind::Secondary => file.recognized_song = Some(recognition.raw.clone()),
            }
        }
        file
    }

    /// Re-normalizes into in-memory metadata. An unparseable raw payload
    /// downgrades the sample to unrecognized instead of failing the load.
    pub fn into_metadata(self, source_id: &str, sample_id: u64) -> SampleMetadata {
        let raw_payload = match self.gracenote {
            Some(raw) => Some((raw, RecognizerKind::Primary)),
            None => self.recognized_song.map(|raw| (raw, RecognizerKind::Secondary)),
        };

        let recognized_song = raw_payload.and_then(|(raw, kind)| match song::normalize(&raw, kind)
        {
            Ok(song) => Some(Recognition { song, raw }),
            Err(err) => {
                warn!(
                    "Dropping {} recognition of sample {}/{}: {}",
                    kind, source_id, sample_id, err
                );
                None
            }
        });

        SampleMetadata {
            recognized_song,
            duration_secs: self.duration,
            bpm: self.bpm,
            hidden: self.hidden,
            keep_unrecognized_on_hide: self.keep_unrecognized_on_hide,
        }
    }
}
