//! Test fixture creation for sample stores and recognizers
//!
//! Samples can be planted on disk before a server starts to simulate a
//! store left behind by a previous run, and recognition back-ends are
//! replaced with static ones so no subprocesses or network are involved.

use anyhow::Result;
use earshot_server::recognition::{Recognizer, StaticRecognizer};
use earshot_server::song::RecognizerKind;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// A minimal but sniffable MP3 payload: an ID3v2 header followed by padding.
pub fn mp3_bytes() -> Vec<u8> {
    let mut bytes = b"ID3\x04\x00\x00\x00\x00\x00\x00".to_vec();
    bytes.resize(bytes.len() + 64, 0);
    bytes
}

/// Raw primary-recognizer payload for the given song.
pub fn primary_raw(track: &str, album: &str, artist: &str) -> Value {
    json!({
        "artist": artist,
        "album": album,
        "track": track,
    })
}

/// A recognizer that always identifies the song in `raw`.
pub fn recognizing(raw: Value) -> Arc<dyn Recognizer> {
    Arc::new(
        StaticRecognizer::recognizing(RecognizerKind::Primary, raw)
            .expect("Fixture payload did not normalize"),
    )
}

/// A recognizer that never identifies anything.
pub fn deaf() -> Arc<dyn Recognizer> {
    Arc::new(StaticRecognizer::no_match(RecognizerKind::Primary))
}

/// Plants a sample on disk the way the server persists them, so a store
/// opened on `samples_root` restores it.
pub fn write_sample(
    samples_root: &Path,
    source_id: &str,
    sample_id: u64,
    raw: Option<Value>,
) -> Result<()> {
    let source_dir = samples_root.join(source_id);
    fs::create_dir_all(&source_dir)?;
    fs::write(source_dir.join(format!("{}.mp3", sample_id)), mp3_bytes())?;
    let sidecar = match raw {
        Some(raw) => json!({ "gracenote": raw }),
        None => json!({}),
    };
    fs::write(
        source_dir.join(format!("{}.json", sample_id)),
        serde_json::to_vec(&sidecar)?,
    )?;
    Ok(())
}
