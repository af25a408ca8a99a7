//! Secondary recognizer: a fingerprinting HTTP service with a blocking
//! client library.
//!
//! The service takes the raw clip bytes and answers with a document whose
//! matches live under `metadata.music`; the first entry wins. Calls run
//! on the blocking pool and a semaphore keeps the number of in-flight
//! lookups bounded.

use super::{Recognizer, RecognizerError};
use crate::sample_store::Recognition;
use crate::song::{self, RecognizerKind};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SecondaryRecognizerConfig {
    pub base_url: String,
    pub access_key: String,
    /// Seconds to skip from the start of the clip before fingerprinting.
    pub offset_seconds: u32,
    pub timeout_sec: u64,
    pub max_in_flight: usize,
}

impl Default for SecondaryRecognizerConfig {
    fn default() -> Self {
        SecondaryRecognizerConfig {
            base_url: "http://localhost:8080".to_owned(),
            access_key: String::new(),
            offset_seconds: 0,
            timeout_sec: 10,
            max_in_flight: 4,
        }
    }
}

pub struct FingerprintApiRecognizer {
    config: SecondaryRecognizerConfig,
    permits: Arc<Semaphore>,
}

impl FingerprintApiRecognizer {
    pub fn new(config: SecondaryRecognizerConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_in_flight));
        let config = SecondaryRecognizerConfig {
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            ..config
        };
        FingerprintApiRecognizer { config, permits }
    }

    fn identify_blocking(
        config: &SecondaryRecognizerConfig,
        audio: Vec<u8>,
    ) -> Result<Value, RecognizerError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_sec))
            .build()
            .map_err(|err| {
                RecognizerError::Unavailable(format!("could not build HTTP client: {}", err))
            })?;

        let url = format!(
            "{}/v1/identify?offset={}",
            config.base_url, config.offset_seconds
        );
        let response = client
            .post(url)
            .header("access-key", &config.access_key)
            .body(audio)
            .send()
            .map_err(|err| {
                RecognizerError::Unavailable(format!("fingerprint service: {}", err))
            })?;

        if !response.status().is_success() {
            return Err(RecognizerError::Unavailable(format!(
                "fingerprint service answered {}",
                response.status()
            )));
        }

        response.json().map_err(|err| {
            RecognizerError::Unavailable(format!("unreadable fingerprint response: {}", err))
        })
    }
}

#[async_trait]
impl Recognizer for FingerprintApiRecognizer {
    fn kind(&self) -> RecognizerKind {
        RecognizerKind::Secondary
    }

    async fn identify(&self, audio_path: &Path) -> Result<Option<Recognition>, RecognizerError> {
        let permit = self.permits.clone().acquire_owned().await.map_err(|_| {
            RecognizerError::Unavailable("fingerprint permit pool closed".to_owned())
        })?;

        let audio = tokio::fs::read(audio_path).await.map_err(|err| {
            RecognizerError::Unavailable(format!("could not read staged audio: {}", err))
        })?;

        let config = self.config.clone();
        let response = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            Self::identify_blocking(&config, audio)
        })
        .await
        .map_err(|err| RecognizerError::Unavailable(format!("lookup task failed: {}", err)))??;

        let Some(matched) = first_match(&response) else {
            debug!("Secondary recognizer found no match");
            return Ok(None);
        };

        let recognized = song::normalize(matched, RecognizerKind::Secondary)?;
        Ok(Some(Recognition {
            song: recognized,
            raw: matched.clone(),
        }))
    }
}

/// The first entry of `metadata.music`, if the response carries one.
fn first_match(response: &Value) -> Option<&Value> {
    response.get("metadata")?.get("music")?.as_array()?.first()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_match_picks_the_best_candidate() {
        let response = json!({
            "status": {"code": 0},
            "metadata": {
                "music": [
                    {"title": "Glory Box"},
                    {"title": "Roads"},
                ],
            },
        });

        assert_eq!(first_match(&response).unwrap()["title"], json!("Glory Box"));
    }

    #[test]
    fn missing_music_section_means_no_match() {
        assert!(first_match(&json!({"status": {"code": 1001}})).is_none());
        assert!(first_match(&json!({"metadata": {"music": []}})).is_none());
        assert!(first_match(&json!({})).is_none());
    }

    #[test]
    fn base_url_is_normalized() {
        let recognizer = FingerprintApiRecognizer::new(SecondaryRecognizerConfig {
            base_url: "http://fingerprint.local/".to_owned(),
            ..Default::default()
        });

        assert_eq!(recognizer.config.base_url, "http://fingerprint.local");
    }
}
