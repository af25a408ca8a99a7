mod file_config;

pub use file_config::{FileConfig, SourceEntry};

use crate::recognition::{PrimaryRecognizerConfig, SecondaryRecognizerConfig};
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub samples_root: Option<PathBuf>,
    pub port: u16,
    pub base_url: Option<String>,
    pub history_capacity: usize,
    pub freshness_window_sec: u64,
    pub logging_level: RequestsLoggingLevel,
    pub listing_cache_ttl_sec: u64,
    pub recognizer_timeout_sec: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub samples_root: PathBuf,
    pub port: u16,
    pub base_url: String,
    pub history_capacity: usize,
    pub freshness_window: Duration,
    pub logging_level: RequestsLoggingLevel,
    pub listing_cache_ttl: Duration,
    pub recognizer_timeout: Duration,

    // Recognition back-ends (absent sections stay disabled)
    pub primary_recognizer: Option<PrimaryRecognizerConfig>,
    pub secondary_recognizer: Option<SecondaryRecognizerConfig>,
    pub analysis: AnalysisSettings,

    /// Upload token to source id.
    pub source_tokens: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub enabled: bool,
    pub max_in_flight: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_in_flight: 4,
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let samples_root = file
            .samples_root
            .map(PathBuf::from)
            .or_else(|| cli.samples_root.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("samples_root must be specified via CLI or in config file")
            })?;

        // Validate samples_root exists
        if !samples_root.exists() {
            bail!("Samples directory does not exist: {:?}", samples_root);
        }
        if !samples_root.is_dir() {
            bail!("samples_root is not a directory: {:?}", samples_root);
        }

        let port = file.port.unwrap_or(cli.port);

        let base_url = file
            .base_url
            .or_else(|| cli.base_url.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("base_url must be specified via --base-url or in config file")
            })?;
        let base_url = base_url.trim_end_matches('/').to_owned();

        let history_capacity = file.history_capacity.unwrap_or(cli.history_capacity);
        if history_capacity == 0 {
            bail!("history_capacity must be at least 1");
        }

        let freshness_window_sec = file
            .freshness_window_sec
            .unwrap_or(cli.freshness_window_sec);
        if freshness_window_sec == 0 {
            bail!("freshness_window_sec must be at least 1");
        }

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let listing_cache_ttl_sec = file
            .listing_cache_ttl_sec
            .unwrap_or(cli.listing_cache_ttl_sec);

        let recognizer_timeout_sec = file
            .recognizer_timeout_sec
            .unwrap_or(cli.recognizer_timeout_sec);
        if recognizer_timeout_sec == 0 {
            bail!("recognizer_timeout_sec must be at least 1");
        }

        let primary_recognizer = match file.primary_recognizer {
            Some(section) => {
                let command_line = section.command.ok_or_else(|| {
                    anyhow::anyhow!("primary_recognizer.command must be specified")
                })?;
                let Some(command) = shlex::split(&command_line) else {
                    bail!(
                        "primary_recognizer.command has unbalanced quoting: {}",
                        command_line
                    );
                };
                if command.is_empty() {
                    bail!("primary_recognizer.command is empty");
                }
                Some(PrimaryRecognizerConfig {
                    command,
                    client_id: section.client_id.ok_or_else(|| {
                        anyhow::anyhow!("primary_recognizer.client_id must be specified")
                    })?,
                    user_id: section.user_id.ok_or_else(|| {
                        anyhow::anyhow!("primary_recognizer.user_id must be specified")
                    })?,
                    license_ref: section.license_ref.ok_or_else(|| {
                        anyhow::anyhow!("primary_recognizer.license_ref must be specified")
                    })?,
                })
            }
            None => None,
        };

        let secondary_recognizer = match file.secondary_recognizer {
            Some(section) => {
                let defaults = SecondaryRecognizerConfig::default();
                Some(SecondaryRecognizerConfig {
                    base_url: section.base_url.ok_or_else(|| {
                        anyhow::anyhow!("secondary_recognizer.base_url must be specified")
                    })?,
                    access_key: section.access_key.ok_or_else(|| {
                        anyhow::anyhow!("secondary_recognizer.access_key must be specified")
                    })?,
                    offset_seconds: section.offset_seconds.unwrap_or(defaults.offset_seconds),
                    timeout_sec: section.timeout_sec.unwrap_or(defaults.timeout_sec),
                    max_in_flight: section.max_in_flight.unwrap_or(defaults.max_in_flight),
                })
            }
            None => None,
        };

        // Analysis settings - merge file config with defaults
        let analysis_file = file.analysis.unwrap_or_default();
        let analysis_defaults = AnalysisSettings::default();
        let analysis = AnalysisSettings {
            enabled: analysis_file.enabled.unwrap_or(analysis_defaults.enabled),
            max_in_flight: analysis_file
                .max_in_flight
                .unwrap_or(analysis_defaults.max_in_flight),
        };
        if analysis.enabled && analysis.max_in_flight == 0 {
            bail!("analysis.max_in_flight must be at least 1");
        }

        let mut source_tokens = HashMap::new();
        for entry in file.sources.unwrap_or_default() {
            if entry.id.is_empty() || entry.token.is_empty() {
                bail!("source entries need both an id and a token");
            }
            if source_tokens.insert(entry.token, entry.id.clone()).is_some() {
                bail!("duplicate upload token for source '{}'", entry.id);
            }
        }

        Ok(Self {
            samples_root,
            port,
            base_url,
            history_capacity,
            freshness_window: Duration::from_secs(freshness_window_sec),
            logging_level,
            listing_cache_ttl: Duration::from_secs(listing_cache_ttl_sec),
            recognizer_timeout: Duration::from_secs(recognizer_timeout_sec),
            primary_recognizer,
            secondary_recognizer,
            analysis,
            source_tokens,
        })
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
