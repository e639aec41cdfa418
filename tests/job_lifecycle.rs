mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fast_policy, orchestrator, wait_terminal, Outcome, ScriptedExtractor};
use media_grabber_lib::downloader::{
    ArtifactError, DownloadError, FormatType, JobError, JobId, JobOrchestrator, JobStatus,
    QualityHint,
};

const VIDEO_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

fn blocked() -> DownloadError {
    DownloadError::Blocked("HTTP Error 403: Forbidden".to_string())
}

#[tokio::test]
async fn always_blocked_stops_after_three_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let ext = Arc::new(ScriptedExtractor::new().always(Outcome::Fail(blocked())));
    let orch = orchestrator(Arc::clone(&ext), &dir);

    let id = orch.submit(VIDEO_URL, FormatType::Video, QualityHint::Best).unwrap();
    let job = wait_terminal(&orch, &id).await;

    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.attempts, 3);
    assert_eq!(ext.download_calls(), 3);
    assert!(job.filename.is_none());
    let error = job.error.unwrap();
    assert!(error.contains("YouTube is blocking requests"), "{}", error);

    let agents = ext.user_agents();
    assert_ne!(agents[0], agents[1]);
    assert_ne!(agents[1], agents[2]);
}

#[tokio::test]
async fn blocked_then_success_rotates_identity() {
    let dir = tempfile::tempdir().unwrap();
    let ext = Arc::new(ScriptedExtractor::new().script(vec![Outcome::Fail(blocked())]));
    let orch = orchestrator(Arc::clone(&ext), &dir);

    let id = orch.submit(VIDEO_URL, FormatType::Video, QualityHint::Best).unwrap();
    let job = wait_terminal(&orch, &id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.attempts, 2);
    let agents = ext.user_agents();
    assert_eq!(agents.len(), 2);
    assert_ne!(agents[0], agents[1]);
}

#[tokio::test]
async fn transient_failure_keeps_identity() {
    let dir = tempfile::tempdir().unwrap();
    let ext = Arc::new(ScriptedExtractor::new().script(vec![Outcome::Fail(
        DownloadError::Transient("Read timed out".to_string()),
    )]));
    let orch = orchestrator(Arc::clone(&ext), &dir);

    let id = orch.submit(VIDEO_URL, FormatType::Video, QualityHint::Best).unwrap();
    let job = wait_terminal(&orch, &id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.attempts, 2);
    let agents = ext.user_agents();
    assert_eq!(agents[0], agents[1]);
}

#[tokio::test]
async fn terminal_failure_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let ext = Arc::new(
        ScriptedExtractor::new()
            .always(Outcome::Fail(DownloadError::Removed("Video unavailable".to_string()))),
    );
    let orch = orchestrator(Arc::clone(&ext), &dir);

    let id = orch.submit(VIDEO_URL, FormatType::Video, QualityHint::Best).unwrap();
    let job = wait_terminal(&orch, &id).await;

    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(ext.download_calls(), 1);
    assert!(job.error.unwrap().contains("Video unavailable"));
}

#[tokio::test]
async fn mp3_request_forces_mp3_extension() {
    let dir = tempfile::tempdir().unwrap();
    let ext = Arc::new(ScriptedExtractor::new().extensions("webm", "mp3"));
    let orch = orchestrator(Arc::clone(&ext), &dir);

    let id = orch.submit(VIDEO_URL, FormatType::AudioMp3, QualityHint::Best).unwrap();
    let job = wait_terminal(&orch, &id).await;

    assert_eq!(job.status, JobStatus::Completed);
    let filename = job.filename.unwrap();
    assert_eq!(filename.extension().and_then(|e| e.to_str()), Some("mp3"));
    assert_eq!(ext.format_specs(), vec!["bestaudio/best".to_string()]);
}

#[tokio::test]
async fn mp4_720p_end_to_end_then_file_removed() {
    let dir = tempfile::tempdir().unwrap();
    let ext = Arc::new(ScriptedExtractor::new());
    let orch = orchestrator(Arc::clone(&ext), &dir);

    let id = orch
        .submit(VIDEO_URL, FormatType::parse("mp4"), QualityHint::parse("720p"))
        .unwrap();
    let job = wait_terminal(&orch, &id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    assert_eq!(job.title.as_deref(), Some("Sample Clip"));
    assert!(job.error.is_none());
    assert_eq!(
        ext.format_specs(),
        vec!["best[height<=720][ext=mp4]/worst[ext=mp4]/best".to_string()]
    );

    let path = orch.get_artifact_path(&id).unwrap();
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("mp4"));
    assert!(path.starts_with(dir.path()));

    std::fs::remove_file(&path).unwrap();
    assert!(matches!(
        orch.get_artifact_path(&id),
        Err(ArtifactError::NotAvailable(_))
    ));
    let job = orch.get_status(&id).unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert!(job.filename.is_none());
    assert_eq!(job.error.as_deref(), Some("Downloaded file not found"));
}

#[tokio::test]
async fn malformed_url_is_rejected_without_a_job() {
    let dir = tempfile::tempdir().unwrap();
    let ext = Arc::new(ScriptedExtractor::new());
    let orch = orchestrator(Arc::clone(&ext), &dir);

    let err = orch
        .submit("not-a-url", FormatType::Video, QualityHint::Best)
        .unwrap_err();
    assert!(matches!(err, JobError::InvalidInput(_)));
    assert!(orch.store().is_empty());
    assert!(orch.get_status(&JobId::generate()).is_none());
    assert_eq!(
        orch.get_artifact_path(&JobId::generate()),
        Err(ArtifactError::NotFound)
    );
    assert_eq!(ext.download_calls(), 0);
}

#[tokio::test]
async fn metadata_failure_goes_straight_to_error() {
    let dir = tempfile::tempdir().unwrap();
    let ext = Arc::new(
        ScriptedExtractor::new()
            .metadata_error(DownloadError::Private("Private video".to_string())),
    );
    let orch = orchestrator(Arc::clone(&ext), &dir);

    let id = orch.submit(VIDEO_URL, FormatType::Video, QualityHint::Best).unwrap();
    let job = wait_terminal(&orch, &id).await;

    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.attempts, 0);
    assert_eq!(ext.download_calls(), 0);
    assert!(job.error.unwrap().contains("Private video"));
}

#[tokio::test]
async fn panicking_extractor_is_caught() {
    let dir = tempfile::tempdir().unwrap();
    let ext = Arc::new(ScriptedExtractor::new().always(Outcome::Panic));
    let orch = orchestrator(Arc::clone(&ext), &dir);

    let id = orch.submit(VIDEO_URL, FormatType::Video, QualityHint::Best).unwrap();
    let job = wait_terminal(&orch, &id).await;

    assert_eq!(job.status, JobStatus::Error);
    assert!(job.error.unwrap().starts_with("System error"));
}

#[tokio::test]
async fn empty_artifact_fails_verification() {
    let dir = tempfile::tempdir().unwrap();
    let ext = Arc::new(ScriptedExtractor::new().always(Outcome::SucceedEmpty));
    let orch = orchestrator(Arc::clone(&ext), &dir);

    let id = orch.submit(VIDEO_URL, FormatType::Video, QualityHint::Best).unwrap();
    let job = wait_terminal(&orch, &id).await;

    assert_eq!(job.status, JobStatus::Error);
    assert!(job.filename.is_none());
    assert!(job.error.unwrap().contains("verification failed"));
    assert!(matches!(
        orch.get_artifact_path(&id),
        Err(ArtifactError::NotAvailable(_))
    ));
}

#[tokio::test]
async fn hung_attempt_times_out_as_transient() {
    let dir = tempfile::tempdir().unwrap();
    let ext = Arc::new(ScriptedExtractor::new().always(Outcome::Hang));
    let orch = JobOrchestrator::builder(ext.clone())
        .download_dir(dir.path())
        .retry_policy(fast_policy(2))
        .verify_grace(Duration::ZERO)
        .attempt_timeout(Some(Duration::from_millis(50)))
        .build();

    let id = orch.submit(VIDEO_URL, FormatType::Video, QualityHint::Best).unwrap();
    let job = wait_terminal(&orch, &id).await;

    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.attempts, 2);
    assert!(job.error.unwrap().starts_with("Download error"));
}

#[tokio::test]
async fn concurrent_jobs_finish_independently() {
    let dir = tempfile::tempdir().unwrap();
    let ext = Arc::new(ScriptedExtractor::new());
    let orch = orchestrator(Arc::clone(&ext), &dir);

    let ids: Vec<JobId> = (0..5)
        .map(|_| orch.submit(VIDEO_URL, FormatType::Video, QualityHint::Best).unwrap())
        .collect();

    let mut files = Vec::new();
    for id in &ids {
        let job = wait_terminal(&orch, id).await;
        assert_eq!(job.status, JobStatus::Completed);
        files.push(job.filename.unwrap());
    }
    files.sort();
    files.dedup();
    assert_eq!(files.len(), 5);
    assert_eq!(orch.store().len(), 5);
}

#[tokio::test]
async fn finished_jobs_are_evicted_after_ttl() {
    let dir = tempfile::tempdir().unwrap();
    let ext = Arc::new(ScriptedExtractor::new());
    let orch = JobOrchestrator::builder(ext.clone())
        .download_dir(dir.path())
        .verify_grace(Duration::ZERO)
        .job_ttl(Duration::ZERO)
        .build();

    let id = orch.submit(VIDEO_URL, FormatType::Video, QualityHint::Best).unwrap();
    wait_terminal(&orch, &id).await;

    assert_eq!(orch.prune_expired(), 1);
    assert!(orch.get_status(&id).is_none());
}

#[tokio::test(start_paused = true)]
async fn sweeper_started_by_builder_evicts_after_ttl() {
    let dir = tempfile::tempdir().unwrap();
    let ext = Arc::new(
        ScriptedExtractor::new()
            .metadata_error(DownloadError::Removed("Video unavailable".to_string())),
    );
    let orch = JobOrchestrator::builder(ext.clone())
        .download_dir(dir.path())
        .job_ttl(Duration::from_secs(60))
        .sweep_interval(Some(Duration::from_secs(10)))
        .build();

    let id = orch.submit(VIDEO_URL, FormatType::Video, QualityHint::Best).unwrap();
    let job = wait_terminal(&orch, &id).await;
    assert_eq!(job.status, JobStatus::Error);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(orch.get_status(&id).is_some(), "evicted before the ttl passed");

    tokio::time::sleep(Duration::from_secs(45)).await;
    assert!(orch.get_status(&id).is_none());
    assert!(orch.store().is_empty());
}

#[tokio::test]
async fn fetch_info_returns_metadata_without_a_job() {
    let dir = tempfile::tempdir().unwrap();
    let ext = Arc::new(ScriptedExtractor::new());
    let orch = orchestrator(Arc::clone(&ext), &dir);

    let info = orch.fetch_info("youtu.be/dQw4w9WgXcQ").await.unwrap();
    assert_eq!(info.title, "Sample Clip");
    assert_eq!(info.duration, "2:05");
    assert!(orch.store().is_empty());

    assert!(matches!(
        orch.fetch_info("ftp://example.com/file").await,
        Err(JobError::InvalidInput(_))
    ));
}
