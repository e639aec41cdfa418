// Error types for extraction, jobs and artifact lookup

use std::path::PathBuf;

use thiserror::Error;

use super::extractors::diagnostics::{diagnose_error, BlockingReason};

/// Coarse failure class the retry engine acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Source refused the request (403, bot check, rate limit). Retry with a new identity.
    Blocked,
    /// Content cannot be fetched from this location (geo block, DRM, members only).
    Unavailable,
    /// Content is private.
    Private,
    /// Content was deleted or taken down.
    Removed,
    /// Network hiccup or timeout. Retry with the same identity.
    Transient,
    /// Anything else. Reported verbatim, never retried.
    Unknown,
}

impl FailureKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Blocked | Self::Transient)
    }
}

/// Failure reported by a [`MediaExtractor`](super::traits::MediaExtractor).
#[derive(Debug, Clone, Error)]
pub enum DownloadError {
    /// The source is blocking automated requests (403, 429, bot detection)
    #[error("Source refused the request: {0}")]
    Blocked(String),

    /// Geo-blocked, DRM protected, members only and similar
    #[error("Content unavailable: {0}")]
    Unavailable(String),

    #[error("Content is private: {0}")]
    Private(String),

    #[error("Content was removed: {0}")]
    Removed(String),

    /// Timeouts, refused connections, dropped sockets
    #[error("Network error: {0}")]
    Transient(String),

    /// yt-dlp not found in system
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Failed to parse extractor output
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("{0}")]
    Unknown(String),
}

impl DownloadError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Blocked(_) => FailureKind::Blocked,
            Self::Unavailable(_) => FailureKind::Unavailable,
            Self::Private(_) => FailureKind::Private,
            Self::Removed(_) => FailureKind::Removed,
            Self::Transient(_) => FailureKind::Transient,
            Self::ToolNotFound(_) | Self::ParseError(_) | Self::Unknown(_) => FailureKind::Unknown,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

// Raw extractor stderr goes through the diagnostics table.
impl From<String> for DownloadError {
    fn from(s: String) -> Self {
        let reason = match diagnose_error(&s) {
            Some(reason) => reason,
            None => return Self::Unknown("extractor failed without output".to_string()),
        };

        let detail = first_error_line(&s);
        tracing::debug!(
            reason = reason.description(),
            identity_might_help = reason.identity_might_help(),
            "classified extractor failure"
        );
        match reason {
            BlockingReason::Http403Forbidden
            | BlockingReason::RateLimited
            | BlockingReason::BotDetection
            | BlockingReason::SabrStreaming
            | BlockingReason::PoTokenRequired => Self::Blocked(detail),
            BlockingReason::NetworkTimeout => Self::Transient(detail),
            BlockingReason::PrivateVideo => Self::Private(detail),
            BlockingReason::VideoUnavailable => Self::Removed(detail),
            BlockingReason::GeoBlocked
            | BlockingReason::AgeRestricted
            | BlockingReason::DrmProtected
            | BlockingReason::MembersOnly => Self::Unavailable(detail),
            BlockingReason::ToolMissing => Self::ToolNotFound(detail),
            BlockingReason::Unknown => Self::Unknown(detail),
        }
    }
}

/// Pick the most useful line out of a multi-line stderr dump.
fn first_error_line(stderr: &str) -> String {
    stderr
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| stderr.lines().map(str::trim).rev().find(|l| !l.is_empty()))
        .unwrap_or("")
        .trim_start_matches("ERROR:")
        .trim()
        .chars()
        .take(300)
        .collect()
}

/// Job-level failure. Everything except `InvalidInput` ends up in a job's `error` field.
#[derive(Debug, Clone, Error)]
pub enum JobError {
    #[error("Invalid URL: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    SourceBlocked(String),

    #[error("{0}")]
    SourceUnavailable(String),

    #[error("Download error: {0}")]
    Transient(String),

    #[error("Download completed but file verification failed: {}", .0.display())]
    VerificationFailed(PathBuf),

    #[error("System error: {0}")]
    Internal(String),
}

impl From<DownloadError> for JobError {
    fn from(e: DownloadError) -> Self {
        match e.kind() {
            FailureKind::Blocked => Self::SourceBlocked(e.to_string()),
            FailureKind::Transient => Self::Transient(e.to_string()),
            FailureKind::Unavailable | FailureKind::Private | FailureKind::Removed => {
                Self::SourceUnavailable(e.to_string())
            }
            FailureKind::Unknown => Self::SourceUnavailable(format!("Error: {}", e)),
        }
    }
}

/// Why `get_artifact_path` could not hand out a file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArtifactError {
    #[error("Download session not found")]
    NotFound,

    #[error("File not available for download: {0}")]
    NotAvailable(String),
}
