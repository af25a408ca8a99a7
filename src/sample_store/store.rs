//! Bounded per-source sample histories, mirrored on disk.
//!
//! The directory layout is `<samples_root>/<source_id>/<id>.mp3` plus a
//! `<id>.json` sidecar per sample. Memory is authoritative while the
//! process runs; the sidecars exist so a restart can rebuild the same
//! histories by scanning the tree.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::models::{Sample, SampleMetadata, SidecarFile};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no prior sample for source '{0}'")]
    NoPriorSample(String),
    #[error("sidecar IO error: {0}")]
    SidecarIo(#[from] std::io::Error),
    #[error("sidecar encoding error: {0}")]
    SidecarEncoding(#[from] serde_json::Error),
}

/// Per-source state. The gate serializes mutation sequences (read latest,
/// decide, mutate); the history lock alone covers snapshot reads so the
/// listing never waits behind an upload.
struct SourceSlot {
    gate: Arc<Mutex<()>>,
    history: RwLock<Vec<Sample>>,
}

impl SourceSlot {
    fn new(history: Vec<Sample>) -> Self {
        SourceSlot {
            gate: Arc::new(Mutex::new(())),
            history: RwLock::new(history),
        }
    }
}

pub struct SampleStore {
    samples_root: PathBuf,
    capacity: usize,
    sources: RwLock<HashMap<String, Arc<SourceSlot>>>,
}

impl SampleStore {
    /// Opens the store rooted at `samples_root`, creating the directory if
    /// needed and rebuilding histories from whatever files are present.
    pub fn open(samples_root: impl Into<PathBuf>, capacity: usize) -> Result<SampleStore, StoreError> {
        let samples_root = samples_root.into();
        std::fs::create_dir_all(&samples_root)?;

        let store = SampleStore {
            samples_root,
            capacity,
            sources: RwLock::new(HashMap::new()),
        };
        store.populate();
        Ok(store)
    }

    /// Acquires the mutation gate for one source and hands back a handle.
    /// Holding the handle blocks every other mutator of the same source;
    /// other sources are unaffected.
    pub async fn source(&self, source_id: &str) -> SourceHandle<'_> {
        let slot = self.slot(source_id);
        let gate = slot.gate.clone().lock_owned().await;
        SourceHandle {
            store: self,
            source_id: source_id.to_owned(),
            slot,
            _gate: gate,
        }
    }

    /// Snapshot of the newest sample without taking the mutation gate.
    pub fn latest(&self, source_id: &str) -> Option<Sample> {
        let slot = self.existing_slot(source_id)?;
        let history = slot.history.read().unwrap();
        history.first().cloned()
    }

    /// Flips the hidden flag of one sample, in memory and in its sidecar.
    /// Returns false when the source or sample is unknown.
    pub async fn toggle_hidden(&self, source_id: &str, sample_id: u64) -> bool {
        if self.existing_slot(source_id).is_none() {
            return false;
        }
        let handle = self.source(source_id).await;
        handle.toggle_hidden(sample_id)
    }

    /// Snapshot of every source's history, newest first.
    pub fn all(&self) -> BTreeMap<String, Vec<Sample>> {
        let sources = self.sources.read().unwrap();
        sources
            .iter()
            .map(|(source_id, slot)| {
                let history = slot.history.read().unwrap();
                (source_id.clone(), history.clone())
            })
            .collect()
    }

    pub fn samples_root(&self) -> &Path {
        &self.samples_root
    }

    /// Whether a history, possibly empty, is tracked for this source.
    pub fn has_source(&self, source_id: &str) -> bool {
        self.existing_slot(source_id).is_some()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn source_dir(&self, source_id: &str) -> PathBuf {
        self.samples_root.join(source_id)
    }

    pub fn audio_path(&self, source_id: &str, sample_id: u64) -> PathBuf {
        self.source_dir(source_id).join(format!("{}.mp3", sample_id))
    }

    pub fn sidecar_path(&self, source_id: &str, sample_id: u64) -> PathBuf {
        self.source_dir(source_id).join(format!("{}.json", sample_id))
    }

    // ========================================================================================
    // Internals
    // ========================================================================================

    /// Rebuilds in-memory histories from the on-disk tree. A sample id is
    /// any numeric `<id>.mp3` or `<id>.json` file name one level below a
    /// source directory; anything else is skipped.
    fn populate(&self) {
        let mut ids_per_source: HashMap<String, BTreeSet<u64>> = HashMap::new();

        for entry in WalkDir::new(&self.samples_root).min_depth(1).max_depth(2) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Skipping unreadable entry under samples root: {}", err);
                    continue;
                }
            };
            if entry.depth() == 1 {
                if entry.file_type().is_dir() {
                    let source_id = entry.file_name().to_string_lossy().into_owned();
                    ids_per_source.entry(source_id).or_default();
                }
                continue;
            }
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(sample_id) = sample_id_of(entry.file_name()) else {
                debug!("Ignoring foreign file {:?}", entry.path());
                continue;
            };
            let Some(source_id) = entry
                .path()
                .parent()
                .and_then(Path::file_name)
                .map(|name| name.to_string_lossy().into_owned())
            else {
                continue;
            };
            ids_per_source.entry(source_id).or_default().insert(sample_id);
        }

        let mut sources = self.sources.write().unwrap();
        for (source_id, sample_ids) in ids_per_source {
            let history: Vec<Sample> = sample_ids
                .iter()
                .rev()
                .take(self.capacity)
                .map(|&id| Sample {
                    id,
                    source_id: source_id.clone(),
                    metadata: self.read_sidecar(&source_id, id),
                })
                .collect();
            info!("Restored {} samples for source '{}'", history.len(), source_id);
            sources.insert(source_id, Arc::new(SourceSlot::new(history)));
        }
    }

    fn slot(&self, source_id: &str) -> Arc<SourceSlot> {
        if let Some(slot) = self.existing_slot(source_id) {
            return slot;
        }
        let mut sources = self.sources.write().unwrap();
        sources
            .entry(source_id.to_owned())
            .or_insert_with(|| Arc::new(SourceSlot::new(Vec::new())))
            .clone()
    }

    fn existing_slot(&self, source_id: &str) -> Option<Arc<SourceSlot>> {
        let sources = self.sources.read().unwrap();
        sources.get(source_id).cloned()
    }

    fn read_sidecar(&self, source_id: &str, sample_id: u64) -> SampleMetadata {
        let path = self.sidecar_path(source_id, sample_id);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            // A missing sidecar is a sample we only know the audio of.
            Err(_) => return SampleMetadata::default(),
        };
        match serde_json::from_str::<SidecarFile>(&content) {
            Ok(file) => file.into_metadata(source_id, sample_id),
            Err(err) => {
                warn!("Unreadable sidecar {:?}: {}", path, err);
                SampleMetadata::default()
            }
        }
    }

    fn persist_sidecar(&self, sample: &Sample) {
        if let Err(err) = self.write_sidecar(sample) {
            warn!(
                "Failed to write sidecar of sample {}/{}: {}",
                sample.source_id, sample.id, err
            );
        }
    }

    fn write_sidecar(&self, sample: &Sample) -> Result<(), StoreError> {
        std::fs::create_dir_all(self.source_dir(&sample.source_id))?;
        let content = serde_json::to_vec(&SidecarFile::from_metadata(&sample.metadata))?;
        std::fs::write(self.sidecar_path(&sample.source_id, sample.id), content)?;
        Ok(())
    }

    fn remove_sample_files(&self, source_id: &str, sample_id: u64) {
        let sidecar = self.sidecar_path(source_id, sample_id);
        let audio = self.audio_path(source_id, sample_id);
        for path in [sidecar, audio] {
            if let Err(err) = std::fs::remove_file(&path) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove {:?}: {}", path, err);
                }
            }
        }
    }
}

/// Exclusive access to one source's history while held.
pub struct SourceHandle<'a> {
    store: &'a SampleStore,
    source_id: String,
    slot: Arc<SourceSlot>,
    _gate: OwnedMutexGuard<()>,
}

impl SourceHandle<'_> {
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn latest(&self) -> Option<Sample> {
        let history = self.slot.history.read().unwrap();
        history.first().cloned()
    }

    /// Prepends a new sample, evicting from the tail to stay within
    /// capacity. The requested id is bumped past the current newest if the
    /// two collide, so histories stay strictly descending. Returns the
    /// sample as stored.
    pub fn add(&self, sample_id: u64, metadata: SampleMetadata) -> Sample {
        let mut history = self.slot.history.write().unwrap();
        let sample_id = id_after(sample_id, history.first().map(|sample| sample.id));

        while history.len() >= self.store.capacity {
            if let Some(evicted) = history.pop() {
                debug!("Evicting sample {}/{}", self.source_id, evicted.id);
                self.store.remove_sample_files(&self.source_id, evicted.id);
            }
        }

        let sample = Sample {
            id: sample_id,
            source_id: self.source_id.clone(),
            metadata,
        };
        self.store.persist_sidecar(&sample);
        history.insert(0, sample.clone());
        sample
    }

    /// Swaps the newest sample for a new one, deleting the superseded
    /// sample's files. History length is unchanged.
    pub fn replace_latest(
        &self,
        sample_id: u64,
        metadata: SampleMetadata,
    ) -> Result<Sample, StoreError> {
        let mut history = self.slot.history.write().unwrap();
        let Some(superseded) = history.first() else {
            return Err(StoreError::NoPriorSample(self.source_id.clone()));
        };

        debug!("Replacing sample {}/{}", self.source_id, superseded.id);
        self.store.remove_sample_files(&self.source_id, superseded.id);

        let sample = Sample {
            id: id_after(sample_id, history.get(1).map(|sample| sample.id)),
            source_id: self.source_id.clone(),
            metadata,
        };
        self.store.persist_sidecar(&sample);
        history[0] = sample.clone();
        Ok(sample)
    }

    pub fn toggle_hidden(&self, sample_id: u64) -> bool {
        let mut history = self.slot.history.write().unwrap();
        let Some(sample) = history.iter_mut().find(|sample| sample.id == sample_id) else {
            return false;
        };
        sample.metadata.hidden = !sample.metadata.hidden;
        self.store.persist_sidecar(sample);
        true
    }
}

fn sample_id_of(file_name: &std::ffi::OsStr) -> Option<u64> {
    let name = file_name.to_str()?;
    let stem = name
        .strip_suffix(".mp3")
        .or_else(|| name.strip_suffix(".json"))?;
    stem.parse().ok()
}

fn id_after(sample_id: u64, floor: Option<u64>) -> u64 {
    match floor {
        Some(floor) if sample_id <= floor => floor + 1,
        _ => sample_id,
    }
}
