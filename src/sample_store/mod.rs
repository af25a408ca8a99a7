//! Bounded per-source sample histories mirrored by on-disk sidecar files.

mod models;
mod store;

pub use models::{Recognition, Sample, SampleMetadata};
pub use store::{SampleStore, SourceHandle, StoreError};
