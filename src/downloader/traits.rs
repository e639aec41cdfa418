// Extraction adapter boundary and progress sink

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::watch;

use super::errors::DownloadError;
use super::format_selector::FormatRequest;
use super::identity::Identity;
use super::models::{MediaInfo, ProgressEvent};
use super::platform::PlatformProfile;

/// Per-attempt settings handed to the adapter
#[derive(Debug, Clone, Copy)]
pub struct AttemptContext<'a> {
    pub identity: &'a Identity,
    pub profile: &'static PlatformProfile,
    /// 1-based
    pub attempt: u32,
}

/// Opaque media-fetching capability (yt-dlp in production, scripted in tests)
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Name of the extractor (for logging)
    fn name(&self) -> &'static str;

    /// Metadata-only query
    async fn fetch_metadata(
        &self,
        url: &str,
        ctx: AttemptContext<'_>,
    ) -> Result<MediaInfo, DownloadError>;

    /// Full download. Reports progress into `sink` and returns the path the
    /// extractor wrote.
    async fn download(
        &self,
        request: &FormatRequest,
        ctx: AttemptContext<'_>,
        sink: &dyn ProgressSink,
    ) -> Result<PathBuf, DownloadError>;
}

/// Receives byte-level progress from an extractor
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Sink backed by a watch channel. Rapid events overwrite each other, so the
/// consumer only ever sees the latest one.
pub struct ProgressEmitter {
    tx: watch::Sender<Option<ProgressEvent>>,
}

impl ProgressEmitter {
    pub fn channel() -> (Self, watch::Receiver<Option<ProgressEvent>>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }
}

impl ProgressSink for ProgressEmitter {
    fn report(&self, event: ProgressEvent) {
        // No receiver means the job is gone; dropping the event is fine.
        let _ = self.tx.send(Some(event));
    }
}
