//! Ordered fallback over recognition back-ends, run alongside clip
//! analysis.

use super::{ClipAnalyzer, Recognizer};
use crate::sample_store::{Recognition, SampleMetadata};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on each individual back-end attempt.
    pub attempt_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

pub struct RecognitionOrchestrator {
    recognizers: Vec<Arc<dyn Recognizer>>,
    analyzer: Option<Arc<dyn ClipAnalyzer>>,
    config: OrchestratorConfig,
}

impl RecognitionOrchestrator {
    pub fn new(
        recognizers: Vec<Arc<dyn Recognizer>>,
        analyzer: Option<Arc<dyn ClipAnalyzer>>,
        config: OrchestratorConfig,
    ) -> Self {
        RecognitionOrchestrator {
            recognizers,
            analyzer,
            config,
        }
    }

    /// Runs recognition and analysis concurrently and folds the results
    /// into sample metadata. Never fails: every back-end problem is
    /// logged and degrades to a `None` field.
    pub async fn recognize(&self, audio_path: &Path, source_id: &str) -> SampleMetadata {
        let (recognized_song, (duration_secs, bpm)) = tokio::join!(
            self.identify(audio_path, source_id),
            self.analyze(audio_path, source_id),
        );

        SampleMetadata {
            recognized_song,
            duration_secs,
            bpm,
            hidden: false,
            keep_unrecognized_on_hide: false,
        }
    }

    /// Tries each back-end in order; the first match wins. An error, a
    /// no-match answer and a timeout all hand over to the next back-end.
    async fn identify(&self, audio_path: &Path, source_id: &str) -> Option<Recognition> {
        for recognizer in &self.recognizers {
            let kind = recognizer.kind();
            match timeout(self.config.attempt_timeout, recognizer.identify(audio_path)).await {
                Ok(Ok(Some(recognition))) => {
                    info!(
                        "Source '{}': {} recognizer matched '{}'",
                        source_id, kind, recognition.song.title
                    );
                    return Some(recognition);
                }
                Ok(Ok(None)) => {
                    debug!("Source '{}': {} recognizer found no match", source_id, kind);
                }
                Ok(Err(err)) => {
                    warn!("Source '{}': {} recognizer failed: {}", source_id, kind, err);
                }
                Err(_) => {
                    warn!(
                        "Source '{}': {} recognizer timed out after {:?}",
                        source_id, kind, self.config.attempt_timeout
                    );
                }
            }
        }
        None
    }

    async fn analyze(&self, audio_path: &Path, source_id: &str) -> (Option<f64>, Option<f64>) {
        let Some(analyzer) = &self.analyzer else {
            return (None, None);
        };

        let (duration, bpm) = tokio::join!(
            timeout(self.config.attempt_timeout, analyzer.probe_duration(audio_path)),
            timeout(self.config.attempt_timeout, analyzer.detect_bpm(audio_path)),
        );

        let duration = match duration {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                debug!("Source '{}': duration probe failed: {}", source_id, err);
                None
            }
            Err(_) => {
                debug!("Source '{}': duration probe timed out", source_id);
                None
            }
        };
        let bpm = match bpm {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                debug!("Source '{}': BPM detection failed: {}", source_id, err);
                None
            }
            Err(_) => {
                debug!("Source '{}': BPM detection timed out", source_id);
                None
            }
        };
        (duration, bpm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::{AnalysisError, RecognizerError};
    use crate::song::{self, RecognizerKind};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behavior {
        Match(Value),
        NoMatch,
        Fail,
        Hang,
    }

    struct ScriptedRecognizer {
        kind: RecognizerKind,
        behavior: Behavior,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedRecognizer {
        fn new(kind: RecognizerKind, behavior: Behavior) -> (Arc<Self>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let recognizer = Arc::new(ScriptedRecognizer {
                kind,
                behavior,
                calls: calls.clone(),
            });
            (recognizer, calls)
        }
    }

    #[async_trait]
    impl Recognizer for ScriptedRecognizer {
        fn kind(&self) -> RecognizerKind {
            self.kind
        }

        async fn identify(
            &self,
            _audio_path: &Path,
        ) -> Result<Option<Recognition>, RecognizerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Match(raw) => Ok(Some(Recognition {
                    song: song::normalize(raw, self.kind).unwrap(),
                    raw: raw.clone(),
                })),
                Behavior::NoMatch => Ok(None),
                Behavior::Fail => Err(RecognizerError::Unavailable("scripted failure".to_owned())),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(None)
                }
            }
        }
    }

    struct FixedAnalyzer {
        duration: Option<f64>,
        bpm: Option<f64>,
    }

    #[async_trait]
    impl ClipAnalyzer for FixedAnalyzer {
        async fn probe_duration(&self, _audio_path: &Path) -> Result<f64, AnalysisError> {
            self.duration
                .ok_or_else(|| AnalysisError::ProbeFailed("scripted failure".to_owned()))
        }

        async fn detect_bpm(&self, _audio_path: &Path) -> Result<f64, AnalysisError> {
            self.bpm
                .ok_or_else(|| AnalysisError::BpmFailed("scripted failure".to_owned()))
        }
    }

    fn primary_raw() -> Value {
        json!({"artist": "Portishead", "album": "Dummy", "track": "Glory Box"})
    }

    fn secondary_raw() -> Value {
        json!({
            "title": "Roads",
            "album": {"name": "Dummy"},
            "artists": [{"name": "Portishead"}],
        })
    }

    fn orchestrator(recognizers: Vec<Arc<dyn Recognizer>>) -> RecognitionOrchestrator {
        RecognitionOrchestrator::new(
            recognizers,
            None,
            OrchestratorConfig {
                attempt_timeout: Duration::from_millis(100),
            },
        )
    }

    #[tokio::test]
    async fn first_match_short_circuits_the_chain() {
        let (primary, _) =
            ScriptedRecognizer::new(RecognizerKind::Primary, Behavior::Match(primary_raw()));
        let (secondary, secondary_calls) =
            ScriptedRecognizer::new(RecognizerKind::Secondary, Behavior::Match(secondary_raw()));

        let metadata = orchestrator(vec![primary, secondary])
            .recognize(Path::new("clip.mp3"), "radio")
            .await;

        assert_eq!(metadata.song().unwrap().title, "Glory Box");
        assert_eq!(secondary_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_backend_hands_over_to_the_next() {
        let (primary, primary_calls) =
            ScriptedRecognizer::new(RecognizerKind::Primary, Behavior::Fail);
        let (secondary, _) =
            ScriptedRecognizer::new(RecognizerKind::Secondary, Behavior::Match(secondary_raw()));

        let metadata = orchestrator(vec![primary, secondary])
            .recognize(Path::new("clip.mp3"), "radio")
            .await;

        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        let recognized = metadata.song().unwrap();
        assert_eq!(recognized.title, "Roads");
        assert_eq!(recognized.recognizer, RecognizerKind::Secondary);
    }

    #[tokio::test]
    async fn no_match_answer_also_hands_over() {
        let (primary, _) = ScriptedRecognizer::new(RecognizerKind::Primary, Behavior::NoMatch);
        let (secondary, secondary_calls) =
            ScriptedRecognizer::new(RecognizerKind::Secondary, Behavior::Match(secondary_raw()));

        let metadata = orchestrator(vec![primary, secondary])
            .recognize(Path::new("clip.mp3"), "radio")
            .await;

        assert_eq!(secondary_calls.load(Ordering::SeqCst), 1);
        assert!(metadata.is_recognized());
    }

    #[tokio::test]
    async fn hung_backend_times_out_and_hands_over() {
        let (primary, _) = ScriptedRecognizer::new(RecognizerKind::Primary, Behavior::Hang);
        let (secondary, _) =
            ScriptedRecognizer::new(RecognizerKind::Secondary, Behavior::Match(secondary_raw()));

        let metadata = orchestrator(vec![primary, secondary])
            .recognize(Path::new("clip.mp3"), "radio")
            .await;

        assert_eq!(metadata.song().unwrap().title, "Roads");
    }

    #[tokio::test]
    async fn exhausted_chain_yields_unrecognized_metadata() {
        let (primary, _) = ScriptedRecognizer::new(RecognizerKind::Primary, Behavior::Fail);
        let (secondary, _) = ScriptedRecognizer::new(RecognizerKind::Secondary, Behavior::NoMatch);

        let metadata = orchestrator(vec![primary, secondary])
            .recognize(Path::new("clip.mp3"), "radio")
            .await;

        assert!(!metadata.is_recognized());
        assert!(!metadata.hidden);
    }

    #[tokio::test]
    async fn empty_chain_yields_unrecognized_metadata() {
        let metadata = orchestrator(Vec::new())
            .recognize(Path::new("clip.mp3"), "radio")
            .await;

        assert!(!metadata.is_recognized());
    }

    #[tokio::test]
    async fn analysis_fields_degrade_independently() {
        let orchestrator = RecognitionOrchestrator::new(
            Vec::new(),
            Some(Arc::new(FixedAnalyzer {
                duration: Some(19.2),
                bpm: None,
            })),
            OrchestratorConfig::default(),
        );

        let metadata = orchestrator.recognize(Path::new("clip.mp3"), "radio").await;

        assert_eq!(metadata.duration_secs, Some(19.2));
        assert!(metadata.bpm.is_none());
    }

    #[tokio::test]
    async fn missing_analyzer_leaves_analysis_fields_empty() {
        let metadata = orchestrator(Vec::new())
            .recognize(Path::new("clip.mp3"), "radio")
            .await;

        assert!(metadata.duration_secs.is_none());
        assert!(metadata.bpm.is_none());
    }
}
