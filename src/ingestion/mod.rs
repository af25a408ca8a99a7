//! Upload ingestion: the append/replace/ignore decision and the pipeline
//! applying it.

mod decision;
mod pipeline;

pub use decision::{decide, IngestAction};
pub use pipeline::{IngestError, IngestOutcome, IngestionManager};
