// Job orchestrator: submission, per-job worker, retry loop and artifact hand-out
//
// Every accepted job gets one worker task. The worker body runs inside a
// nested task so a panic in the extractor still ends with an `error`
// transition written by the outer task.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::backends::YtDlpCli;
use super::errors::{ArtifactError, DownloadError, FailureKind, JobError};
use super::format_selector::FormatSelector;
use super::identity::IdentityPool;
use super::models::{
    DownloadRequest, FormatType, Job, JobId, JobStatus, MediaInfo, QualityHint,
};
use super::platform::{Classification, Platform, UrlClassifier};
use super::progress::ProgressTracker;
use super::retry::{RetryDecision, RetryPolicy};
use super::store::JobStore;
use super::traits::{AttemptContext, MediaExtractor, ProgressEmitter};
use super::utils::normalize_extension;
use super::verify::ArtifactVerifier;
use crate::config::GrabberConfig;

const MISSING_ARTIFACT: &str = "Downloaded file not found";

struct Inner {
    store: Arc<JobStore>,
    extractor: Arc<dyn MediaExtractor>,
    classifier: UrlClassifier,
    identities: IdentityPool,
    policy: RetryPolicy,
    verifier: ArtifactVerifier,
    download_dir: PathBuf,
    attempt_timeout: Option<Duration>,
    job_ttl: Duration,
}

/// Cheap to clone; all clones share one job store.
#[derive(Clone)]
pub struct JobOrchestrator {
    inner: Arc<Inner>,
}

pub struct OrchestratorBuilder {
    extractor: Arc<dyn MediaExtractor>,
    store: Option<Arc<JobStore>>,
    classifier: UrlClassifier,
    identities: Option<IdentityPool>,
    policy: RetryPolicy,
    verifier: ArtifactVerifier,
    download_dir: PathBuf,
    attempt_timeout: Option<Duration>,
    job_ttl: Duration,
    sweep_interval: Option<Duration>,
}

impl OrchestratorBuilder {
    pub fn store(mut self, store: Arc<JobStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn classifier(mut self, classifier: UrlClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn identities(mut self, identities: IdentityPool) -> Self {
        self.identities = Some(identities);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn verify_grace(mut self, grace: Duration) -> Self {
        self.verifier = ArtifactVerifier::new(grace);
        self
    }

    pub fn download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    pub fn attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn job_ttl(mut self, ttl: Duration) -> Self {
        self.job_ttl = ttl;
        self
    }

    /// Start the eviction sweeper on `build`. Needs a running tokio runtime.
    pub fn sweep_interval(mut self, interval: Option<Duration>) -> Self {
        self.sweep_interval = interval.filter(|d| !d.is_zero());
        self
    }

    pub fn build(self) -> JobOrchestrator {
        let sweep_interval = self.sweep_interval;
        let orchestrator = JobOrchestrator {
            inner: Arc::new(Inner {
                store: self.store.unwrap_or_default(),
                extractor: self.extractor,
                classifier: self.classifier,
                identities: self.identities.unwrap_or_default(),
                policy: self.policy,
                verifier: self.verifier,
                download_dir: self.download_dir,
                attempt_timeout: self.attempt_timeout,
                job_ttl: self.job_ttl,
            }),
        };

        if let Some(interval) = sweep_interval {
            if Handle::try_current().is_ok() {
                orchestrator.spawn_sweeper(interval);
            } else {
                tracing::warn!("no async runtime; finished jobs will not be evicted automatically");
            }
        }
        orchestrator
    }
}

impl JobOrchestrator {
    pub fn builder(extractor: Arc<dyn MediaExtractor>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            extractor,
            store: None,
            classifier: UrlClassifier::default(),
            identities: None,
            policy: RetryPolicy::default(),
            verifier: ArtifactVerifier::default(),
            download_dir: PathBuf::from("downloads"),
            attempt_timeout: None,
            job_ttl: Duration::from_secs(3600),
            sweep_interval: None,
        }
    }

    /// Production wiring: yt-dlp CLI adapter configured from `config`.
    pub fn from_config(config: &GrabberConfig) -> Self {
        let extractor = YtDlpCli::new(config.ytdlp_path.as_deref())
            .with_metadata_timeout(config.metadata_timeout_secs)
            .with_proxy(config.proxy.clone());
        tracing::info!(binary = %extractor.binary().display(), "using yt-dlp");

        Self::builder(Arc::new(extractor))
            .classifier(UrlClassifier::new(config.classifier_mode()))
            .identities(IdentityPool::from_user_agents(&config.user_agents))
            .retry_policy(config.retry_policy())
            .verify_grace(config.verify_grace())
            .download_dir(config.download_dir.clone())
            .attempt_timeout(config.attempt_timeout())
            .job_ttl(config.job_ttl())
            .sweep_interval(Some(config.sweep_interval()))
            .build()
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.inner.store
    }

    pub fn classifier(&self) -> &UrlClassifier {
        &self.inner.classifier
    }

    fn classify(&self, url: &str) -> Result<Platform, JobError> {
        match self.inner.classifier.classify(url) {
            Classification::Supported(platform) => Ok(platform),
            Classification::Unsupported => Err(JobError::InvalidInput(url.trim().to_string())),
        }
    }

    /// Accept a job and start its worker. Unsupported URLs are rejected here
    /// and never reach the store.
    pub fn submit(
        &self,
        url: &str,
        format: FormatType,
        quality: QualityHint,
    ) -> Result<JobId, JobError> {
        let platform = self.classify(url)?;
        let runtime = Handle::try_current()
            .map_err(|e| JobError::Internal(format!("no async runtime: {}", e)))?;

        let request = DownloadRequest {
            url: url.trim().to_string(),
            format,
            quality,
            platform,
        };

        let id = loop {
            let candidate = JobId::generate();
            if self.inner.store.insert(Job::new(candidate.clone(), &request)) {
                break candidate;
            }
        };
        tracing::info!(job_id = %id, platform = %platform, format = ?format, quality = %quality, "job accepted");

        let inner = Arc::clone(&self.inner);
        let job_id = id.clone();
        runtime.spawn(async move {
            let worker = tokio::spawn(Arc::clone(&inner).run_job(job_id.clone(), request));
            let outcome = match worker.await {
                Ok(result) => result,
                Err(e) if e.is_panic() => Err(JobError::Internal("worker panicked".to_string())),
                Err(e) => Err(JobError::Internal(e.to_string())),
            };
            inner.finish(&job_id, outcome);
        });

        Ok(id)
    }

    /// Current snapshot. A completed job whose file is gone is demoted first.
    pub fn get_status(&self, id: &JobId) -> Option<Job> {
        let job = self.inner.store.get(id)?;
        if job.status == JobStatus::Completed && !artifact_present(&job) {
            tracing::warn!(job_id = %id, "artifact disappeared after completion");
            return self.inner.store.demote_missing_artifact(id, MISSING_ARTIFACT);
        }
        Some(job)
    }

    /// Path of a completed job's file, re-checked on every call.
    pub fn get_artifact_path(&self, id: &JobId) -> Result<PathBuf, ArtifactError> {
        let job = self.get_status(id).ok_or(ArtifactError::NotFound)?;
        match (job.status, job.filename) {
            (JobStatus::Completed, Some(path)) => Ok(path),
            (JobStatus::Error, _) => Err(ArtifactError::NotAvailable(
                job.error.unwrap_or_else(|| MISSING_ARTIFACT.to_string()),
            )),
            (status, _) => Err(ArtifactError::NotAvailable(format!("job is still {}", status))),
        }
    }

    /// Metadata preview without creating a job.
    pub async fn fetch_info(&self, url: &str) -> Result<MediaInfo, JobError> {
        let platform = self.classify(url)?;
        let rotation = self.inner.identities.rotation();
        let ctx = AttemptContext {
            identity: rotation.current(),
            profile: platform.profile(),
            attempt: 1,
        };
        self.inner
            .extractor
            .fetch_metadata(url.trim(), ctx)
            .await
            .map_err(JobError::from)
    }

    /// Evict terminal jobs older than the configured TTL.
    pub fn prune_expired(&self) -> usize {
        let removed = self.inner.store.prune_finished(self.inner.job_ttl);
        if removed > 0 {
            tracing::debug!(removed, "evicted finished jobs");
        }
        removed
    }

    /// Run `prune_expired` every `interval` until the last orchestrator clone is dropped.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                JobOrchestrator { inner }.prune_expired();
            }
        })
    }
}

fn artifact_present(job: &Job) -> bool {
    job.filename
        .as_deref()
        .map(ArtifactVerifier::still_present)
        .unwrap_or(false)
}

impl Inner {
    /// The single terminal write for a job.
    fn finish(&self, id: &JobId, outcome: Result<PathBuf, JobError>) {
        match outcome {
            Ok(path) => {
                if self.store.complete(id, path.clone()) {
                    tracing::info!(job_id = %id, path = %path.display(), "job completed");
                }
            }
            Err(e) => {
                if self.store.fail(id, e.to_string()) {
                    tracing::warn!(job_id = %id, error = %e, "job failed");
                }
            }
        }
    }

    async fn run_job(self: Arc<Self>, id: JobId, request: DownloadRequest) -> Result<PathBuf, JobError> {
        let profile = request.platform.profile();
        let mut rotation = self.identities.rotation();

        let info = self
            .extractor
            .fetch_metadata(
                &request.url,
                AttemptContext {
                    identity: rotation.current(),
                    profile,
                    attempt: 1,
                },
            )
            .await
            .map_err(|e| {
                tracing::warn!(job_id = %id, error = %e, "metadata fetch failed");
                JobError::from(e)
            })?;

        self.store.start_downloading(&id, info.title.clone());
        tracing::debug!(job_id = %id, title = %info.title, "metadata received");

        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .map_err(|e| {
                JobError::Internal(format!(
                    "cannot create {}: {}",
                    self.download_dir.display(),
                    e
                ))
            })?;

        let format_request = FormatSelector::build(
            &request.url,
            request.format,
            request.quality,
            &self.download_dir,
        );
        let tracker = ProgressTracker::new(Arc::clone(&self.store));

        let mut attempt = 0u32;
        let reported = loop {
            attempt += 1;
            self.store.begin_attempt(&id);
            let ctx = AttemptContext {
                identity: rotation.current(),
                profile,
                attempt,
            };
            tracing::info!(
                job_id = %id,
                attempt,
                extractor = self.extractor.name(),
                user_agent = %ctx.identity.user_agent,
                "download attempt started"
            );

            let (emitter, rx) = ProgressEmitter::channel();
            let consumer = tokio::spawn(tracker.clone().consume(id.clone(), rx));

            let download = self.extractor.download(&format_request, ctx, &emitter);
            let result = match self.attempt_timeout {
                Some(limit) => match tokio::time::timeout(limit, download).await {
                    Ok(r) => r,
                    Err(_) => Err(DownloadError::Transient(format!(
                        "attempt timed out after {}s",
                        limit.as_secs()
                    ))),
                },
                None => download.await,
            };

            drop(emitter);
            if let Err(e) = consumer.await {
                tracing::warn!(job_id = %id, error = %e, "progress consumer ended abnormally");
            }

            let err = match result {
                Ok(path) => break path,
                Err(e) => e,
            };

            let kind = err.kind();
            tracing::warn!(job_id = %id, attempt, kind = ?kind, error = %err, "download attempt failed");

            match self.policy.decide(attempt, kind) {
                RetryDecision::RotateIdentity => {
                    let next = rotation.rotate();
                    tracing::info!(job_id = %id, user_agent = %next.user_agent, "rotating identity");
                }
                RetryDecision::RetryAfter(delay) => {
                    tracing::debug!(job_id = %id, delay_ms = delay.as_millis() as u64, "retrying after delay");
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => {
                    return Err(match kind {
                        FailureKind::Blocked => JobError::SourceBlocked(profile.blocked_message()),
                        _ => JobError::from(err),
                    });
                }
            }
        };

        let artifact = finalize_artifact(&reported, request.format).await;
        if self.verifier.verify(&artifact).await {
            Ok(artifact)
        } else {
            Err(JobError::VerificationFailed(artifact))
        }
    }
}

/// Apply the requested extension. If only the extractor's original file
/// exists, move it to the normalized name.
async fn finalize_artifact(reported: &Path, format: FormatType) -> PathBuf {
    let normalized = normalize_extension(reported, format);
    if normalized != reported
        && !tokio::fs::try_exists(&normalized).await.unwrap_or(false)
        && tokio::fs::try_exists(reported).await.unwrap_or(false)
    {
        if let Err(e) = tokio::fs::rename(reported, &normalized).await {
            tracing::warn!(from = %reported.display(), to = %normalized.display(), error = %e, "rename failed");
            return reported.to_path_buf();
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finalize_renames_when_only_original_exists() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("song.webm");
        std::fs::write(&original, b"audio").unwrap();

        let path = finalize_artifact(&original, FormatType::AudioM4a).await;
        assert_eq!(path, dir.path().join("song.m4a"));
        assert!(path.is_file());
        assert!(!original.exists());
    }

    #[tokio::test]
    async fn finalize_prefers_existing_normalized_file() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("song.webm");
        let mp3 = dir.path().join("song.mp3");
        std::fs::write(&original, b"source").unwrap();
        std::fs::write(&mp3, b"transcoded").unwrap();

        let path = finalize_artifact(&original, FormatType::AudioMp3).await;
        assert_eq!(path, mp3);
        assert!(original.exists());
    }

    #[tokio::test]
    async fn finalize_leaves_video_alone() {
        let p = Path::new("/nowhere/clip.webm");
        assert_eq!(finalize_artifact(p, FormatType::Video).await, p);
    }
}
