// Common data models for download jobs

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::platform::Platform;

/// Opaque job handle handed out by `submit`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// `dl_<unix seconds>_<random suffix>`; the suffix avoids collisions
    /// between submissions that land in the same second.
    pub fn generate() -> Self {
        let secs = time::OffsetDateTime::now_utc().unix_timestamp();
        let suffix: u32 = rand::random::<u32>() % 9_000_000 + 1_000_000;
        Self(format!("dl_{}_{}", secs, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Preparing,
    Downloading,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Preparing => "preparing",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Requested output kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormatType {
    Video,
    AudioMp3,
    AudioM4a,
}

impl FormatType {
    /// Lenient parse: `mp3`/`audio-mp3`, `m4a`/`audio-m4a`, anything else is video.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "mp3" | "audio-mp3" | "audio" => Self::AudioMp3,
            "m4a" | "audio-m4a" => Self::AudioM4a,
            _ => Self::Video,
        }
    }

    /// Extension the final artifact must carry, if the format dictates one
    pub fn forced_extension(&self) -> Option<&'static str> {
        match self {
            Self::AudioMp3 => Some("mp3"),
            Self::AudioM4a => Some("m4a"),
            Self::Video => None,
        }
    }

    pub fn is_audio(&self) -> bool {
        !matches!(self, Self::Video)
    }
}

/// Quality hint for video requests. Ignored for audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityHint {
    Best,
    /// Height cap in pixels (720, 480 or 360)
    MaxHeight(u32),
    Worst,
}

impl QualityHint {
    pub const HEIGHT_TIERS: [u32; 3] = [720, 480, 360];

    /// `best`, `720p`, `480p`, `360p`; anything unrecognised falls to `Worst`.
    pub fn parse(s: &str) -> Self {
        let s = s.trim().to_lowercase();
        if s == "best" || s.is_empty() {
            return Self::Best;
        }
        s.strip_suffix('p')
            .and_then(|h| h.parse::<u32>().ok())
            .filter(|h| Self::HEIGHT_TIERS.contains(h))
            .map(Self::MaxHeight)
            .unwrap_or(Self::Worst)
    }
}

impl fmt::Display for QualityHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Best => f.write_str("best"),
            Self::MaxHeight(h) => write!(f, "{}p", h),
            Self::Worst => f.write_str("worst"),
        }
    }
}

/// Validated submission, consumed by the orchestrator
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub format: FormatType,
    pub quality: QualityHint,
    pub platform: Platform,
}

/// Metadata returned by a metadata-only query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub title: String,
    /// `M:SS`, or `Unknown` when the source reports no duration
    pub duration: String,
    pub duration_seconds: u64,
    pub thumbnail: String,
    pub uploader: String,
    pub view_count: u64,
}

impl MediaInfo {
    pub const UNKNOWN_TITLE: &'static str = "Unknown Title";
    pub const UNKNOWN_UPLOADER: &'static str = "Unknown Uploader";

    /// Build from possibly-missing fields, applying the documented defaults.
    pub fn from_parts(
        title: Option<String>,
        duration_seconds: Option<u64>,
        thumbnail: Option<String>,
        uploader: Option<String>,
        view_count: Option<u64>,
    ) -> Self {
        let duration_seconds = duration_seconds.unwrap_or(0);
        Self {
            title: title.unwrap_or_else(|| Self::UNKNOWN_TITLE.to_string()),
            duration: format_duration(duration_seconds),
            duration_seconds,
            thumbnail: thumbnail.unwrap_or_default(),
            uploader: uploader.unwrap_or_else(|| Self::UNKNOWN_UPLOADER.to_string()),
            view_count: view_count.unwrap_or(0),
        }
    }
}

/// Format seconds as `M:SS` (minutes are not folded into hours).
pub fn format_duration(seconds: u64) -> String {
    if seconds == 0 {
        return "Unknown".to_string();
    }
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Snapshot of one job as seen by status pollers
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub title: Option<String>,
    pub filename: Option<PathBuf>,
    pub error: Option<String>,
    pub platform: Option<Platform>,
    pub format: FormatType,
    /// Download attempts started so far
    pub attempts: u32,
    /// Unix seconds
    pub created_at: i64,
    /// Runtime clock, so eviction follows a paused test clock
    #[serde(skip)]
    pub(crate) finished_at: Option<Instant>,
}

impl Job {
    pub fn new(id: JobId, request: &DownloadRequest) -> Self {
        Self {
            id,
            status: JobStatus::Preparing,
            progress: 0,
            title: None,
            filename: None,
            error: None,
            platform: Some(request.platform),
            format: request.format,
            attempts: 0,
            created_at: time::OffsetDateTime::now_utc().unix_timestamp(),
            finished_at: None,
        }
    }
}

/// Byte-level progress reported by an extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Exact total size is known
    Exact { downloaded: u64, total: u64 },
    /// Only an estimate of the total is known
    Estimated { downloaded: u64, estimate: u64 },
    /// The byte stream finished (post-processing may still follow)
    Finished,
}
