//! Earshot Sample Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod config;
pub mod ingestion;
pub mod recognition;
pub mod sample_store;
pub mod server;
pub mod song;
pub mod ttl_cache;

// Re-export commonly used types for convenience
pub use ingestion::{IngestAction, IngestionManager};
pub use sample_store::SampleStore;
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig, SourceDirectory};
