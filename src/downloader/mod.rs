// Downloader module: job orchestration on top of a pluggable media extractor

pub mod backends;
pub mod errors;
pub mod extractors;
pub mod format_selector;
pub mod identity;
pub mod models;
pub mod orchestrator;
pub mod platform;
pub mod progress;
pub mod retry;
pub mod store;
pub mod traits;
pub mod utils;
pub mod verify;

pub use backends::YtDlpCli;
pub use errors::{ArtifactError, DownloadError, FailureKind, JobError};
pub use format_selector::{FormatRequest, FormatSelector};
pub use identity::{Identity, IdentityPool};
pub use models::{FormatType, Job, JobId, JobStatus, MediaInfo, ProgressEvent, QualityHint};
pub use orchestrator::{JobOrchestrator, OrchestratorBuilder};
pub use platform::{Classification, ClassifierMode, Platform, UrlClassifier};
pub use retry::RetryPolicy;
pub use store::JobStore;
pub use traits::{AttemptContext, MediaExtractor, ProgressSink};
