//! Primary recognizer: an external fingerprinting subprocess.
//!
//! The helper is invoked once per clip with the account credentials and
//! the audio path as positional arguments. It prints a single JSON
//! document on stdout: either the matched song or `{"error": ...}` when
//! the catalog has no answer.

use super::{Recognizer, RecognizerError};
use crate::sample_store::Recognition;
use crate::song::{self, MalformedRecognitionResult, RecognizerKind};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PrimaryRecognizerConfig {
    /// Program plus leading arguments, e.g. `["python3", "identify.py"]`.
    pub command: Vec<String>,
    pub client_id: String,
    pub user_id: String,
    pub license_ref: String,
}

pub struct ProcessRecognizer {
    config: PrimaryRecognizerConfig,
}

impl ProcessRecognizer {
    pub fn new(config: PrimaryRecognizerConfig) -> Self {
        ProcessRecognizer { config }
    }
}

#[async_trait]
impl Recognizer for ProcessRecognizer {
    fn kind(&self) -> RecognizerKind {
        RecognizerKind::Primary
    }

    async fn identify(&self, audio_path: &Path) -> Result<Option<Recognition>, RecognizerError> {
        let Some((program, leading_args)) = self.config.command.split_first() else {
            return Err(RecognizerError::Unavailable(
                "empty recognizer command".to_owned(),
            ));
        };

        let output = Command::new(program)
            .args(leading_args)
            .arg(&self.config.client_id)
            .arg(&self.config.user_id)
            .arg(&self.config.license_ref)
            .arg(audio_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| {
                RecognizerError::Unavailable(format!("failed to run '{}': {}", program, err))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecognizerError::Unavailable(format!(
                "recognizer exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let raw: Value = serde_json::from_str(&stdout).map_err(|err| {
            MalformedRecognitionResult(format!("recognizer printed invalid JSON: {}", err))
        })?;

        // No-match is reported as an error document with a zero exit code.
        if let Some(reason) = raw.get("error") {
            debug!("Primary recognizer found no match: {}", reason);
            return Ok(None);
        }

        let recognized = song::normalize(&raw, RecognizerKind::Primary)?;
        Ok(Some(Recognition {
            song: recognized,
            raw,
        }))
    }
}
