//! External media URL extractor (yt-dlp)
//!
//! Some hosts are easier to handle with a dedicated extraction tool than by
//! scraping. The tool runs as a subprocess with a hard timeout.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Default time allowed for one extraction
pub const DEFAULT_EXTRACTOR_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the external extractor
#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("Extractor '{0}' not found. Install it first.")]
    NotFound(String),
    #[error("Failed to run extractor: {0}")]
    Io(#[from] std::io::Error),
    #[error("Extractor exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("Extractor timed out after {0:?}")]
    Timeout(Duration),
    #[error("Extractor printed no URL")]
    NoOutput,
}

/// Turns a page URL into a direct media URL
#[async_trait]
pub trait GenericExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<String, ExtractorError>;
}

/// yt-dlp subprocess (`yt-dlp -g -f best URL`)
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: String,
    timeout: Duration,
}

impl YtDlp {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new("yt-dlp", DEFAULT_EXTRACTOR_TIMEOUT)
    }
}

#[async_trait]
impl GenericExtractor for YtDlp {
    async fn extract(&self, url: &str) -> Result<String, ExtractorError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["-g", "-f", "best", url])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ExtractorError::NotFound(self.binary.clone())
            } else {
                ExtractorError::Io(e)
            }
        })?;

        // Dropping the future on timeout kills the child
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ExtractorError::Timeout(self.timeout))??;

        if !output.status.success() {
            return Err(ExtractorError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        first_url_line(&String::from_utf8_lossy(&output.stdout)).ok_or(ExtractorError::NoOutput)
    }
}

/// Extractor that never succeeds, for callers that disable the tool
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExtractor;

#[async_trait]
impl GenericExtractor for NoExtractor {
    async fn extract(&self, _url: &str) -> Result<String, ExtractorError> {
        Err(ExtractorError::NotFound("none".to_string()))
    }
}

fn first_url_line(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("http://") || l.starts_with("https://"))
        .map(str::to_string)
}
