pub mod config;
pub mod downloader;
pub mod logging;

pub use config::GrabberConfig;
pub use downloader::{JobOrchestrator, JobStatus};
