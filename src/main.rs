use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
use config::{AppConfig, CliConfig, FileConfig};

mod ingestion;
use ingestion::IngestionManager;

mod recognition;
use recognition::{
    ClipAnalyzer, FingerprintApiRecognizer, OrchestratorConfig, ProcessClipAnalyzer,
    ProcessRecognizer, RecognitionOrchestrator, Recognizer,
};

mod sample_store;
use sample_store::SampleStore;

mod server;
use server::{run_server, SourceDirectory};

mod song;

mod ttl_cache;

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory where sample clips and their metadata sidecars are stored.
    #[clap(value_parser = parse_path)]
    pub samples_root: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 55669)]
    pub port: u16,

    /// Public base URL used to build sample download links.
    #[clap(long)]
    pub base_url: Option<String>,

    /// How many samples to keep per source before evicting the oldest.
    #[clap(long, default_value_t = 10)]
    pub history_capacity: usize,

    /// Seconds during which an upload counts as a continuation of the latest sample.
    #[clap(long, default_value_t = 300)]
    pub freshness_window_sec: u64,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: server::RequestsLoggingLevel,

    /// Seconds to cache the sources listing for.
    #[clap(long, default_value_t = 15)]
    pub listing_cache_ttl_sec: u64,

    /// Timeout in seconds for a single recognition back-end attempt.
    #[clap(long, default_value_t = 30)]
    pub recognizer_timeout_sec: u64,

    /// Path to a TOML config file. Values in it override the command line.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        samples_root: cli_args.samples_root,
        port: cli_args.port,
        base_url: cli_args.base_url,
        history_capacity: cli_args.history_capacity,
        freshness_window_sec: cli_args.freshness_window_sec,
        logging_level: cli_args.logging_level,
        listing_cache_ttl_sec: cli_args.listing_cache_ttl_sec,
        recognizer_timeout_sec: cli_args.recognizer_timeout_sec,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Opening sample store at {:?}...", config.samples_root);
    let sample_store = Arc::new(SampleStore::open(
        &config.samples_root,
        config.history_capacity,
    )?);

    let mut recognizers: Vec<Arc<dyn Recognizer>> = Vec::new();
    if let Some(primary) = config.primary_recognizer {
        info!("Primary recognizer configured: {:?}", primary.command);
        recognizers.push(Arc::new(ProcessRecognizer::new(primary)));
    }
    if let Some(secondary) = config.secondary_recognizer {
        info!("Secondary recognizer configured at {}", secondary.base_url);
        recognizers.push(Arc::new(FingerprintApiRecognizer::new(secondary)));
    }
    if recognizers.is_empty() {
        warn!("No recognizers configured, every sample will be stored unrecognized");
    }

    let analyzer: Option<Arc<dyn ClipAnalyzer>> = if config.analysis.enabled {
        Some(Arc::new(ProcessClipAnalyzer::new(
            config.analysis.max_in_flight,
        )))
    } else {
        None
    };

    let orchestrator = Arc::new(RecognitionOrchestrator::new(
        recognizers,
        analyzer,
        OrchestratorConfig {
            attempt_timeout: config.recognizer_timeout,
        },
    ));

    let ingestion_manager = Arc::new(IngestionManager::new(
        sample_store.clone(),
        orchestrator,
        config.freshness_window,
    ));

    let source_directory = SourceDirectory::new(config.source_tokens);
    if source_directory.is_empty() {
        warn!("No source tokens configured, every upload will be rejected");
    }

    info!("Ready to serve at port {}!", config.port);
    run_server(
        sample_store,
        ingestion_manager,
        source_directory,
        config.logging_level,
        config.port,
        config.base_url,
        config.listing_cache_ttl,
    )
    .await
}
