//! Song recognition back-ends and their orchestration.
//!
//! Back-ends sit behind the [`Recognizer`] trait so the orchestrator can
//! try them as an ordered fallback chain and tests can swap in
//! [`StaticRecognizer`] instead of spawning processes or hitting the
//! network.

mod analysis;
mod orchestrator;
mod primary;
mod secondary;

pub use analysis::{AnalysisError, ClipAnalyzer, ProcessClipAnalyzer};
pub use orchestrator::{OrchestratorConfig, RecognitionOrchestrator};
pub use primary::{PrimaryRecognizerConfig, ProcessRecognizer};
pub use secondary::{FingerprintApiRecognizer, SecondaryRecognizerConfig};

use crate::sample_store::Recognition;
use crate::song::{self, MalformedRecognitionResult, RecognizerKind};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecognizerError {
    #[error("recognizer unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Malformed(#[from] MalformedRecognitionResult),
}

/// One recognition back-end.
#[async_trait]
pub trait Recognizer: Send + Sync {
    fn kind(&self) -> RecognizerKind;

    /// Identifies the clip at `audio_path`. `Ok(None)` means the back-end
    /// answered but knows no matching song.
    async fn identify(&self, audio_path: &Path) -> Result<Option<Recognition>, RecognizerError>;
}

/// Recognizer that always returns the same result. Used by tests and
/// handy for local development without recognition credentials.
pub struct StaticRecognizer {
    kind: RecognizerKind,
    result: Option<Recognition>,
}

impl StaticRecognizer {
    /// A recognizer that matches every clip to the song described by the
    /// given raw back-end payload.
    pub fn recognizing(kind: RecognizerKind, raw: Value) -> Result<Self, MalformedRecognitionResult> {
        let recognized = song::normalize(&raw, kind)?;
        Ok(StaticRecognizer {
            kind,
            result: Some(Recognition { song: recognized, raw }),
        })
    }

    /// A recognizer that never matches anything.
    pub fn no_match(kind: RecognizerKind) -> Self {
        StaticRecognizer { kind, result: None }
    }
}

#[async_trait]
impl Recognizer for StaticRecognizer {
    fn kind(&self) -> RecognizerKind {
        self.kind
    }

    async fn identify(&self, _audio_path: &Path) -> Result<Option<Recognition>, RecognizerError> {
        Ok(self.result.clone())
    }
}
