// yt-dlp CLI backend
//
// Metadata comes from `--dump-json`. Downloads run with a machine-readable
// progress template and `--print after_move:` so we learn the final path
// without guessing what yt-dlp did to the title.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command as TokioCommand;

use crate::downloader::errors::DownloadError;
use crate::downloader::format_selector::FormatRequest;
use crate::downloader::models::{MediaInfo, ProgressEvent};
use crate::downloader::traits::{AttemptContext, MediaExtractor, ProgressSink};
use crate::downloader::utils::{find_ytdlp, run_output_with_timeout};

const PROGRESS_TEMPLATE: &str = "download:[progress] %(progress.downloaded_bytes)s %(progress.total_bytes)s %(progress.total_bytes_estimate)s %(progress.status)s";
const FINAL_PATH_TEMPLATE: &str = "after_move:[final] %(filepath)s";

lazy_static::lazy_static! {
    static ref PROGRESS_RE: Regex = Regex::new(
        r"^\[progress\]\s+(\S+)\s+(\S+)\s+(\S+)\s+(\S+)"
    ).unwrap();
    static ref FINAL_RE: Regex = Regex::new(r"^\[final\]\s+(.+)$").unwrap();
}

pub struct YtDlpCli {
    binary: PathBuf,
    metadata_timeout_secs: u64,
    proxy: Option<String>,
}

impl YtDlpCli {
    pub fn new(binary_override: Option<&Path>) -> Self {
        Self {
            binary: find_ytdlp(binary_override),
            metadata_timeout_secs: 30,
            proxy: None,
        }
    }

    pub fn with_metadata_timeout(mut self, secs: u64) -> Self {
        self.metadata_timeout_secs = secs;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Flags shared by metadata and download invocations
    fn identity_args(&self, ctx: &AttemptContext<'_>) -> Vec<String> {
        let profile = ctx.profile;
        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            profile.socket_timeout_secs.to_string(),
            "--user-agent".to_string(),
            ctx.identity.user_agent.clone(),
        ];

        // The rotating identity wins over a profile header of the same name.
        let headers = profile
            .extra_headers
            .iter()
            .filter(|(k, _)| !ctx.identity.has_header(k))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .chain(ctx.identity.headers.iter().cloned());
        for (name, value) in headers {
            args.push("--add-header".to_string());
            args.push(format!("{}:{}", name, value));
        }

        if let Some(extractor_args) = profile.extractor_args {
            args.push("--extractor-args".to_string());
            args.push(extractor_args.to_string());
        }
        if profile.force_ipv4 {
            args.push("--force-ipv4".to_string());
        }
        if let Some(proxy) = &self.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }
        args
    }

    fn metadata_args(&self, url: &str, ctx: &AttemptContext<'_>) -> Vec<String> {
        let mut args = vec!["--dump-json".to_string(), "--skip-download".to_string()];
        args.extend(self.identity_args(ctx));
        args.push(url.to_string());
        args
    }

    fn download_args(&self, request: &FormatRequest, ctx: &AttemptContext<'_>) -> Vec<String> {
        let profile = ctx.profile;
        let mut args = vec![
            "-f".to_string(),
            request.format_spec.clone(),
            "-o".to_string(),
            request.output_template.to_string_lossy().into_owned(),
            "--newline".to_string(),
            "--progress".to_string(),
            "--progress-template".to_string(),
            PROGRESS_TEMPLATE.to_string(),
            "--no-simulate".to_string(),
            "--print".to_string(),
            FINAL_PATH_TEMPLATE.to_string(),
            "--retries".to_string(),
            profile.retries.to_string(),
            "--fragment-retries".to_string(),
            profile.fragment_retries.to_string(),
        ];
        args.extend(self.identity_args(ctx));

        if let Some(transcode) = request.transcode {
            args.push("-x".to_string());
            args.push("--audio-format".to_string());
            args.push(transcode.codec().to_string());
        }

        args.push(request.url.clone());
        args
    }
}

#[async_trait]
impl MediaExtractor for YtDlpCli {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn fetch_metadata(
        &self,
        url: &str,
        ctx: AttemptContext<'_>,
    ) -> Result<MediaInfo, DownloadError> {
        let program = self.binary.to_string_lossy().into_owned();
        let args = self.metadata_args(url, &ctx);
        tracing::debug!(program = %program, "fetching metadata");

        let output = run_output_with_timeout(&program, args, self.metadata_timeout_secs)
            .await
            .map_err(DownloadError::from)?;

        if !output.status.success() {
            return Err(DownloadError::from(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }
        parse_media_info(&output.stdout)
    }

    async fn download(
        &self,
        request: &FormatRequest,
        ctx: AttemptContext<'_>,
        sink: &dyn ProgressSink,
    ) -> Result<PathBuf, DownloadError> {
        let args = self.download_args(request, &ctx);
        tracing::debug!(
            attempt = ctx.attempt,
            format = %request.format_spec,
            "starting yt-dlp download"
        );

        let mut child = TokioCommand::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DownloadError::ToolNotFound(format!("{}: {}", self.binary.display(), e))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::Unknown("Failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DownloadError::Unknown("Failed to capture stderr".to_string()))?;

        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();
        let mut out_open = true;
        let mut err_open = true;
        let mut final_path: Option<PathBuf> = None;
        let mut stderr_text = String::new();

        // --progress may land on either stream depending on --quiet, so both are scanned.
        while out_open || err_open {
            tokio::select! {
                line = out_lines.next_line(), if out_open => match line {
                    Ok(Some(line)) => {
                        handle_line(&line, sink, &mut final_path);
                    }
                    _ => out_open = false,
                },
                line = err_lines.next_line(), if err_open => match line {
                    Ok(Some(line)) => {
                        if !handle_line(&line, sink, &mut final_path) {
                            stderr_text.push_str(&line);
                            stderr_text.push('\n');
                        }
                    }
                    _ => err_open = false,
                },
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| DownloadError::Unknown(format!("Process error: {}", e)))?;

        if !status.success() {
            return Err(DownloadError::from(stderr_text));
        }

        final_path.ok_or_else(|| {
            DownloadError::ParseError("yt-dlp finished without reporting an output path".to_string())
        })
    }
}

/// Returns true if the line was machine output we understood.
fn handle_line(line: &str, sink: &dyn ProgressSink, final_path: &mut Option<PathBuf>) -> bool {
    if let Some(event) = parse_progress_line(line) {
        sink.report(event);
        return true;
    }
    if let Some(caps) = FINAL_RE.captures(line.trim_end()) {
        if let Some(m) = caps.get(1) {
            *final_path = Some(PathBuf::from(m.as_str()));
            return true;
        }
    }
    false
}

/// Parse a `[progress] <downloaded> <total> <estimate> <status>` line.
/// Missing numbers are printed by yt-dlp as `NA`.
pub fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let caps = PROGRESS_RE.captures(line.trim())?;
    let status = caps.get(4)?.as_str();
    if status == "finished" {
        return Some(ProgressEvent::Finished);
    }

    let downloaded = parse_bytes(caps.get(1)?.as_str())?;
    if let Some(total) = parse_bytes(caps.get(2)?.as_str()) {
        return Some(ProgressEvent::Exact { downloaded, total });
    }
    parse_bytes(caps.get(3)?.as_str()).map(|estimate| ProgressEvent::Estimated {
        downloaded,
        estimate,
    })
}

fn parse_bytes(s: &str) -> Option<u64> {
    if s == "NA" || s == "None" {
        return None;
    }
    s.parse::<u64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f as u64))
}

/// Shared JSON parsing logic
pub fn parse_media_info(stdout: &[u8]) -> Result<MediaInfo, DownloadError> {
    let json_str = String::from_utf8_lossy(stdout);
    let json: serde_json::Value = serde_json::from_str(json_str.trim())
        .map_err(|e| DownloadError::ParseError(format!("Invalid JSON: {}", e)))?;

    let text = |key: &str| json[key].as_str().map(|s| s.to_string());

    Ok(MediaInfo::from_parts(
        text("title"),
        json["duration"].as_f64().map(|d| d.max(0.0) as u64),
        text("thumbnail"),
        text("uploader"),
        json["view_count"].as_u64(),
    ))
}
