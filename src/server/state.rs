use axum::extract::FromRef;

use crate::ingestion::IngestionManager;
use crate::sample_store::SampleStore;
use crate::ttl_cache::TtlCache;
use std::sync::Arc;
use std::time::Instant;

use super::source_auth::SourceDirectory;
use super::ServerConfig;

pub type GuardedSampleStore = Arc<SampleStore>;
pub type GuardedIngestionManager = Arc<IngestionManager>;
pub type GuardedSourceDirectory = Arc<SourceDirectory>;
pub type GuardedListingCache = Arc<TtlCache<String, serde_json::Value>>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub sample_store: GuardedSampleStore,
    pub ingestion_manager: GuardedIngestionManager,
    pub source_directory: GuardedSourceDirectory,
    pub listing_cache: GuardedListingCache,
}

impl FromRef<ServerState> for GuardedSampleStore {
    fn from_ref(input: &ServerState) -> Self {
        input.sample_store.clone()
    }
}

impl FromRef<ServerState> for GuardedIngestionManager {
    fn from_ref(input: &ServerState) -> Self {
        input.ingestion_manager.clone()
    }
}

impl FromRef<ServerState> for GuardedSourceDirectory {
    fn from_ref(input: &ServerState) -> Self {
        input.source_directory.clone()
    }
}

impl FromRef<ServerState> for GuardedListingCache {
    fn from_ref(input: &ServerState) -> Self {
        input.listing_cache.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
