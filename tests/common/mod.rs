// Scripted in-memory extractor for orchestrator scenarios
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use media_grabber_lib::downloader::{
    AttemptContext, DownloadError, FormatRequest, Job, JobId, JobOrchestrator, MediaExtractor,
    MediaInfo, ProgressEvent, ProgressSink, RetryPolicy,
};

/// What one download call does
#[derive(Debug, Clone)]
pub enum Outcome {
    Succeed,
    Fail(DownloadError),
    /// Writes a zero-byte file and reports success
    SucceedEmpty,
    Panic,
    /// Never returns on its own
    Hang,
}

pub struct ScriptedExtractor {
    metadata: Result<MediaInfo, DownloadError>,
    script: Mutex<VecDeque<Outcome>>,
    fallback: Outcome,
    reported_ext: String,
    written_ext: String,
    calls: AtomicU32,
    user_agents: Mutex<Vec<String>>,
    format_specs: Mutex<Vec<String>>,
}

impl ScriptedExtractor {
    pub fn new() -> Self {
        Self {
            metadata: Ok(MediaInfo::from_parts(
                Some("Sample Clip".to_string()),
                Some(125),
                Some("https://img.example/thumb.jpg".to_string()),
                Some("Someone".to_string()),
                Some(1234),
            )),
            script: Mutex::new(VecDeque::new()),
            fallback: Outcome::Succeed,
            reported_ext: "mp4".to_string(),
            written_ext: "mp4".to_string(),
            calls: AtomicU32::new(0),
            user_agents: Mutex::new(Vec::new()),
            format_specs: Mutex::new(Vec::new()),
        }
    }

    /// Outcomes for the first calls, in order
    pub fn script(self, outcomes: Vec<Outcome>) -> Self {
        *self.script.lock().unwrap() = outcomes.into();
        self
    }

    /// Outcome once the script is used up
    pub fn always(mut self, outcome: Outcome) -> Self {
        self.fallback = outcome;
        self
    }

    pub fn metadata_error(mut self, err: DownloadError) -> Self {
        self.metadata = Err(err);
        self
    }

    /// Extension reported back vs extension actually written to disk
    pub fn extensions(mut self, reported: &str, written: &str) -> Self {
        self.reported_ext = reported.to_string();
        self.written_ext = written.to_string();
        self
    }

    pub fn download_calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn user_agents(&self) -> Vec<String> {
        self.user_agents.lock().unwrap().clone()
    }

    pub fn format_specs(&self) -> Vec<String> {
        self.format_specs.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaExtractor for ScriptedExtractor {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch_metadata(
        &self,
        _url: &str,
        _ctx: AttemptContext<'_>,
    ) -> Result<MediaInfo, DownloadError> {
        self.metadata.clone()
    }

    async fn download(
        &self,
        request: &FormatRequest,
        ctx: AttemptContext<'_>,
        sink: &dyn ProgressSink,
    ) -> Result<PathBuf, DownloadError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.user_agents
            .lock()
            .unwrap()
            .push(ctx.identity.user_agent.clone());
        self.format_specs
            .lock()
            .unwrap()
            .push(request.format_spec.clone());

        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        let dir = request.output_template.parent().unwrap().to_path_buf();
        let stem = format!("clip-{}-{}", std::process::id(), n);

        let empty = matches!(outcome, Outcome::SucceedEmpty);
        match outcome {
            Outcome::Fail(e) => Err(e),
            Outcome::Panic => panic!("extractor blew up"),
            Outcome::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(DownloadError::Unknown("woke up".to_string()))
            }
            Outcome::Succeed | Outcome::SucceedEmpty => {
                sink.report(ProgressEvent::Estimated { downloaded: 10, estimate: 100 });
                sink.report(ProgressEvent::Exact { downloaded: 50, total: 100 });
                let bytes: &[u8] = if empty { b"" } else { b"fake media payload" };
                std::fs::write(dir.join(format!("{}.{}", stem, self.written_ext)), bytes).unwrap();
                sink.report(ProgressEvent::Finished);
                Ok(dir.join(format!("{}.{}", stem, self.reported_ext)))
            }
        }
    }
}

pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        transient_delay: Duration::from_millis(10),
    }
}

pub fn orchestrator(extractor: Arc<ScriptedExtractor>, dir: &tempfile::TempDir) -> JobOrchestrator {
    JobOrchestrator::builder(extractor)
        .download_dir(dir.path())
        .retry_policy(fast_policy(3))
        .verify_grace(Duration::ZERO)
        .build()
}

/// Poll until the job is terminal. Panics after five seconds.
pub async fn wait_terminal(orch: &JobOrchestrator, id: &JobId) -> Job {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let job = orch.get_status(id).expect("job should exist");
        if job.status.is_terminal() {
            return job;
        }
        assert!(tokio::time::Instant::now() < deadline, "job {} never finished: {:?}", id, job);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
