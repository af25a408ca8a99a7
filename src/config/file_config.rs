use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub samples_root: Option<String>,
    pub port: Option<u16>,
    pub base_url: Option<String>,
    pub history_capacity: Option<usize>,
    pub freshness_window_sec: Option<u64>,
    pub logging_level: Option<String>,
    pub listing_cache_ttl_sec: Option<u64>,
    pub recognizer_timeout_sec: Option<u64>,

    // Feature configs
    pub primary_recognizer: Option<PrimaryRecognizerConfig>,
    pub secondary_recognizer: Option<SecondaryRecognizerConfig>,
    pub analysis: Option<AnalysisConfig>,

    // Upload sources
    pub sources: Option<Vec<SourceEntry>>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct PrimaryRecognizerConfig {
    /// Command line of the recognizer helper, shell-style quoting.
    pub command: Option<String>,
    pub client_id: Option<String>,
    pub user_id: Option<String>,
    pub license_ref: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SecondaryRecognizerConfig {
    pub base_url: Option<String>,
    pub access_key: Option<String>,
    pub offset_seconds: Option<u32>,
    pub timeout_sec: Option<u64>,
    pub max_in_flight: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct AnalysisConfig {
    pub enabled: Option<bool>,
    pub max_in_flight: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceEntry {
    pub id: String,
    pub token: String,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
