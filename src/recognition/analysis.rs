//! Best-effort clip analysis: duration via ffprobe, tempo via sox piped
//! into soundstretch. Both tools are optional niceties; callers treat
//! failures as missing data, not fatal errors.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::Semaphore;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("ffprobe failed: {0}")]
    ProbeFailed(String),
    #[error("bpm detection failed: {0}")]
    BpmFailed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid output: {0}")]
    InvalidOutput(String),
}

#[async_trait]
pub trait ClipAnalyzer: Send + Sync {
    async fn probe_duration(&self, audio_path: &Path) -> Result<f64, AnalysisError>;
    async fn detect_bpm(&self, audio_path: &Path) -> Result<f64, AnalysisError>;
}

/// Analyzer shelling out to the audio tools, with a cap on how many child
/// processes run at once.
pub struct ProcessClipAnalyzer {
    permits: Arc<Semaphore>,
}

impl ProcessClipAnalyzer {
    pub fn new(max_in_flight: usize) -> Self {
        ProcessClipAnalyzer {
            permits: Arc::new(Semaphore::new(max_in_flight)),
        }
    }

    async fn acquire(&self) -> Result<tokio::sync::SemaphorePermit<'_>, AnalysisError> {
        self.permits
            .acquire()
            .await
            .map_err(|_| AnalysisError::InvalidOutput("analysis pool closed".to_owned()))
    }
}

#[async_trait]
impl ClipAnalyzer for ProcessClipAnalyzer {
    async fn probe_duration(&self, audio_path: &Path) -> Result<f64, AnalysisError> {
        let _permit = self.acquire().await?;

        let output = Command::new("ffprobe")
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(audio_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AnalysisError::ProbeFailed(stderr.trim().to_owned()));
        }

        duration_from_probe(&output.stdout)
    }

    async fn detect_bpm(&self, audio_path: &Path) -> Result<f64, AnalysisError> {
        let _permit = self.acquire().await?;

        // soundstretch only reads WAV, so convert first.
        let wav = tempfile::Builder::new().suffix(".wav").tempfile()?;
        let sox = Command::new("sox")
            .arg(audio_path)
            .arg(wav.path())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;
        if !sox.status.success() {
            let stderr = String::from_utf8_lossy(&sox.stderr);
            return Err(AnalysisError::BpmFailed(format!(
                "sox: {}",
                stderr.trim()
            )));
        }

        let soundstretch = Command::new("soundstretch")
            .arg(wav.path())
            .arg("-bpm")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;
        if !soundstretch.status.success() {
            let stderr = String::from_utf8_lossy(&soundstretch.stderr);
            return Err(AnalysisError::BpmFailed(format!(
                "soundstretch: {}",
                stderr.trim()
            )));
        }

        // soundstretch logs on stderr or stdout depending on build.
        let report = format!(
            "{}{}",
            String::from_utf8_lossy(&soundstretch.stdout),
            String::from_utf8_lossy(&soundstretch.stderr)
        );
        parse_bpm(&report).ok_or_else(|| {
            AnalysisError::InvalidOutput("no BPM rate in soundstretch output".to_owned())
        })
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

fn duration_from_probe(stdout: &[u8]) -> Result<f64, AnalysisError> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)
        .map_err(|err| AnalysisError::InvalidOutput(format!("ffprobe JSON: {}", err)))?;
    let duration = probe
        .format
        .duration
        .ok_or_else(|| AnalysisError::InvalidOutput("no duration in ffprobe output".to_owned()))?;
    duration
        .parse()
        .map_err(|err| AnalysisError::InvalidOutput(format!("duration '{}': {}", duration, err)))
}

/// Scans a soundstretch report for the `Detected BPM rate` line; the rate
/// is its last whitespace-separated token.
fn parse_bpm(report: &str) -> Option<f64> {
    report
        .lines()
        .find(|line| line.trim_start().starts_with("Detected BPM rate"))
        .and_then(|line| line.split_whitespace().last())
        .and_then(|token| token.parse().ok())
}
