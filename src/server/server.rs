use anyhow::Result;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::{debug, error};

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;

use super::{log_requests, state::*, RequestsLoggingLevel, ServerConfig};
use super::{source_auth::UploadSource, stream_sample::stream_sample, SourceDirectory};
use crate::{
    ingestion::{IngestAction, IngestOutcome, IngestionManager},
    sample_store::{Sample, SampleStore},
    song::Song,
    ttl_cache::TtlCache,
};

/// Clips are short, anything bigger than this is not a legitimate upload.
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub version: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Serialize)]
struct UploadResponse {
    action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sample_id: Option<u64>,
}

impl From<IngestOutcome> for UploadResponse {
    fn from(outcome: IngestOutcome) -> UploadResponse {
        let action = match outcome.action {
            IngestAction::Ignore => "ignored",
            IngestAction::ReplaceLatest => "replaced",
            IngestAction::AppendNew => "appended",
        };
        UploadResponse {
            action,
            sample_id: outcome.sample_id,
        }
    }
}

#[derive(Serialize)]
struct ListedSample {
    date: String,
    link: String,
    metadata: ListedMetadata,
}

#[derive(Serialize)]
struct ListedMetadata {
    recognized_song: Option<Song>,
    duration_secs: Option<f64>,
    bpm: Option<f64>,
    hidden: bool,
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        version: env!("CARGO_PKG_VERSION").to_owned(),
    };
    Json(stats)
}

async fn upload_sample(
    source: UploadSource,
    State(ingestion_manager): State<GuardedIngestionManager>,
    body: Bytes,
) -> Response {
    if body.is_empty() {
        return StatusCode::BAD_REQUEST.into_response();
    }
    match infer::get(&body) {
        Some(kind) if kind.mime_type().starts_with("audio/") => {}
        _ => {
            debug!(
                "Rejecting upload from '{}', payload is not audio",
                source.source_id
            );
            return StatusCode::BAD_REQUEST.into_response();
        }
    }

    match ingestion_manager.ingest(&source.source_id, &body).await {
        Ok(outcome) => Json(UploadResponse::from(outcome)).into_response(),
        Err(err) => {
            error!(
                "Failed to ingest sample from '{}': {}",
                source.source_id, err
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn list_sources(State(state): State<ServerState>) -> Response {
    match build_sources_listing(&state) {
        Ok(listing) => Json(listing).into_response(),
        Err(err) => {
            error!("Failed to build sources listing: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn build_sources_listing(state: &ServerState) -> serde_json::Result<Value> {
    let mut listing = serde_json::Map::new();
    for (source_id, samples) in state.sample_store.all() {
        let entry = match state.listing_cache.get(&source_id) {
            Some(cached) => cached,
            None => {
                let fresh = serde_json::to_value(source_listing(state, &source_id, &samples))?;
                state.listing_cache.insert(source_id.clone(), fresh.clone());
                fresh
            }
        };
        listing.insert(source_id, entry);
    }
    Ok(Value::Object(listing))
}

fn source_listing(state: &ServerState, source_id: &str, samples: &[Sample]) -> Vec<ListedSample> {
    samples
        .iter()
        .map(|sample| ListedSample {
            date: sample.readable_date(),
            link: format!(
                "{}/uploads/{}/{}",
                state.config.base_url,
                urlencoding::encode(source_id),
                sample.audio_file_name()
            ),
            metadata: ListedMetadata {
                recognized_song: sample.metadata.song().cloned(),
                duration_secs: sample.metadata.duration_secs,
                bpm: sample.metadata.bpm,
                hidden: sample.metadata.hidden,
            },
        })
        .collect()
}

async fn toggle_sample_hidden(
    source: UploadSource,
    State(sample_store): State<GuardedSampleStore>,
    Path(sample_id): Path<u64>,
) -> Response {
    if sample_store
        .toggle_hidden(&source.source_id, sample_id)
        .await
    {
        StatusCode::OK.into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

impl ServerState {
    fn new(
        config: ServerConfig,
        sample_store: Arc<SampleStore>,
        ingestion_manager: Arc<IngestionManager>,
        source_directory: SourceDirectory,
    ) -> ServerState {
        let listing_cache = Arc::new(TtlCache::new(config.listing_cache_ttl));
        ServerState {
            config,
            start_time: Instant::now(),
            sample_store,
            ingestion_manager,
            source_directory: Arc::new(source_directory),
            listing_cache,
        }
    }
}

pub fn make_app(
    config: ServerConfig,
    sample_store: Arc<SampleStore>,
    ingestion_manager: Arc<IngestionManager>,
    source_directory: SourceDirectory,
) -> Result<Router> {
    let state = ServerState::new(config, sample_store, ingestion_manager, source_directory);

    let mut app: Router = Router::new()
        .route("/", get(home))
        .route("/upload", post(upload_sample))
        .route("/sources", get(list_sources))
        .route("/samples/{sample_id}/hidden", post(toggle_sample_hidden))
        .route("/uploads/{source_id}/{file_name}", get(stream_sample))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    app = app.layer(middleware::from_fn_with_state(state, log_requests));

    Ok(app)
}

pub async fn run_server(
    sample_store: Arc<SampleStore>,
    ingestion_manager: Arc<IngestionManager>,
    source_directory: SourceDirectory,
    requests_logging_level: RequestsLoggingLevel,
    port: u16,
    base_url: String,
    listing_cache_ttl: Duration,
) -> Result<()> {
    let config = ServerConfig {
        requests_logging_level,
        port,
        base_url,
        listing_cache_ttl,
    };
    let app = make_app(config, sample_store, ingestion_manager, source_directory)?;

    // Remote sources upload over the network, bind on all interfaces.
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    Ok(axum::serve(listener, app).await?)
}
