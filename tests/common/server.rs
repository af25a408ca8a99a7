//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own sample store.

use super::constants::*;
use earshot_server::ingestion::IngestionManager;
use earshot_server::recognition::{OrchestratorConfig, RecognitionOrchestrator, Recognizer};
use earshot_server::sample_store::SampleStore;
use earshot_server::server::{
    server::make_app, RequestsLoggingLevel, ServerConfig, SourceDirectory,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance with an isolated sample store
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Directory the sample store persists clips and sidecars under
    pub samples_root: PathBuf,

    // Private fields - keep resources alive until drop
    _temp_samples_dir: Option<TempDir>,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a server with no recognition back-ends; every upload stays
    /// unrecognized.
    pub async fn spawn() -> Self {
        Self::spawn_with(Vec::new()).await
    }

    /// Spawns a server with the given recognition back-ends on a fresh store.
    pub async fn spawn_with(recognizers: Vec<Arc<dyn Recognizer>>) -> Self {
        let temp_samples_dir = TempDir::new().expect("Failed to create samples dir");
        let samples_root = temp_samples_dir.path().to_path_buf();
        Self::spawn_inner(samples_root, Some(temp_samples_dir), recognizers).await
    }

    /// Spawns a server on an existing samples directory, for restart scenarios.
    ///
    /// The caller keeps ownership of the directory; dropping the returned
    /// server leaves its contents in place.
    pub async fn spawn_on(samples_root: &Path, recognizers: Vec<Arc<dyn Recognizer>>) -> Self {
        Self::spawn_inner(samples_root.to_path_buf(), None, recognizers).await
    }

    async fn spawn_inner(
        samples_root: PathBuf,
        temp_samples_dir: Option<TempDir>,
        recognizers: Vec<Arc<dyn Recognizer>>,
    ) -> Self {
        let sample_store = Arc::new(
            SampleStore::open(&samples_root, HISTORY_CAPACITY)
                .expect("Failed to open sample store"),
        );

        let orchestrator = Arc::new(RecognitionOrchestrator::new(
            recognizers,
            None, // No ffprobe/soundstretch in tests
            OrchestratorConfig {
                attempt_timeout: Duration::from_secs(5),
            },
        ));

        let ingestion_manager = Arc::new(IngestionManager::new(
            sample_store.clone(),
            orchestrator,
            Duration::from_secs(FRESHNESS_WINDOW_SECS),
        ));

        let source_directory = SourceDirectory::new(HashMap::from([
            (SOURCE_1_TOKEN.to_owned(), SOURCE_1_ID.to_owned()),
            (SOURCE_2_TOKEN.to_owned(), SOURCE_2_ID.to_owned()),
        ]));

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            base_url: base_url.clone(),
            listing_cache_ttl: Duration::ZERO, // Disable caching in tests
        };

        let app = make_app(config, sample_store, ingestion_manager, source_directory)
            .expect("Failed to build app");

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            samples_root,
            _temp_samples_dir: temp_samples_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => {
                    // Server is ready
                    return;
                }
                _ => {
                    // Server not ready yet, wait and retry
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
        // TempDir cleans up automatically
    }
}
