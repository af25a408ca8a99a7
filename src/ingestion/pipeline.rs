//! Upload pipeline: stage the clip, recognize it, then decide and mutate
//! the store under the source's gate.

use super::decision::{decide, IngestAction};
use crate::recognition::RecognitionOrchestrator;
use crate::sample_store::{Sample, SampleStore, StoreError};
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("could not persist upload: {0}")]
    Persist(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOutcome {
    pub action: IngestAction,
    /// Id the clip was stored under; `None` when it was ignored.
    pub sample_id: Option<u64>,
}

pub struct IngestionManager {
    store: Arc<SampleStore>,
    orchestrator: Arc<RecognitionOrchestrator>,
    freshness_window: Duration,
}

impl IngestionManager {
    pub fn new(
        store: Arc<SampleStore>,
        orchestrator: Arc<RecognitionOrchestrator>,
        freshness_window: Duration,
    ) -> Self {
        IngestionManager {
            store,
            orchestrator,
            freshness_window,
        }
    }

    /// Runs one clip through the pipeline. Recognition happens before the
    /// source gate is taken, so slow back-ends never block the decision
    /// sequences of other uploads from the same source longer than the
    /// store mutation itself.
    pub async fn ingest(&self, source_id: &str, audio: &[u8]) -> Result<IngestOutcome, IngestError> {
        let staged = self.stage(source_id, audio)?;
        let metadata = self.orchestrator.recognize(staged.path(), source_id).await;

        let handle = self.store.source(source_id).await;
        let now = unix_now();
        let latest = handle.latest();
        let action = decide(latest.as_ref(), &metadata, now, self.freshness_window);

        let sample_id = match action {
            // Dropping the staged file removes it from the source dir.
            IngestAction::Ignore => None,
            IngestAction::AppendNew => {
                let sample = handle.add(now, metadata);
                self.persist_audio(staged, &sample)?;
                Some(sample.id)
            }
            IngestAction::ReplaceLatest => {
                let sample = handle.replace_latest(now, metadata)?;
                self.persist_audio(staged, &sample)?;
                Some(sample.id)
            }
        };

        info!("Source '{}': {:?} ({} bytes)", source_id, action, audio.len());
        Ok(IngestOutcome { action, sample_id })
    }

    /// Writes the clip into a temp file inside the source's own directory,
    /// so the final persist is a same-filesystem rename.
    fn stage(&self, source_id: &str, audio: &[u8]) -> Result<NamedTempFile, IngestError> {
        let dir = self.store.source_dir(source_id);
        std::fs::create_dir_all(&dir)?;
        let mut staged = NamedTempFile::new_in(&dir)?;
        staged.write_all(audio)?;
        debug!("Staged {} bytes at {:?}", audio.len(), staged.path());
        Ok(staged)
    }

    fn persist_audio(&self, staged: NamedTempFile, sample: &Sample) -> Result<(), IngestError> {
        let target = self.store.audio_path(&sample.source_id, sample.id);
        staged.persist(&target).map_err(|err| err.error)?;
        Ok(())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
