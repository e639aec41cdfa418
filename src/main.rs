use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use media_grabber_lib::config::{self, GrabberConfig};
use media_grabber_lib::downloader::{FormatType, JobOrchestrator, JobStatus, QualityHint};
use media_grabber_lib::logging;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Parser)]
#[command(name = "media-grabber")]
#[command(about = "Download media from supported platforms through yt-dlp", long_about = None)]
struct Cli {
    /// Config file to use instead of the per-user one
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show title, duration and uploader without downloading.
    Info {
        url: String,
    },

    /// Download one item and wait for it to finish.
    Get {
        url: String,

        /// mp4, mp3 or m4a
        #[arg(long, default_value = "mp4")]
        format: String,

        /// best, 720p, 480p or 360p
        #[arg(long, default_value = "best")]
        quality: String,

        /// Overrides download_dir from the config
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    logging::init_logging();

    if let Err(err) = run(Cli::parse()).await {
        eprintln!("media-grabber error: {}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let mut cfg: GrabberConfig = match &cli.config {
        Some(path) => config::load_or_init_at(path),
        None => config::load_or_init(),
    }
    .map_err(|e| e.to_string())?;
    tracing::debug!("loaded config: {:?}", cfg);

    match cli.command {
        Command::Info { url } => {
            let orchestrator = JobOrchestrator::from_config(&cfg);
            let info = orchestrator.fetch_info(&url).await.map_err(|e| e.to_string())?;
            println!("Title:    {}", info.title);
            println!("Duration: {}", info.duration);
            println!("Uploader: {}", info.uploader);
            println!("Views:    {}", info.view_count);
            if !info.thumbnail.is_empty() {
                println!("Thumb:    {}", info.thumbnail);
            }
            Ok(())
        }
        Command::Get {
            url,
            format,
            quality,
            output,
        } => {
            if let Some(dir) = output {
                cfg.download_dir = dir;
            }
            let orchestrator = JobOrchestrator::from_config(&cfg);
            let id = orchestrator
                .submit(&url, FormatType::parse(&format), QualityHint::parse(&quality))
                .map_err(|e| e.to_string())?;
            eprintln!("job {}", id);

            let mut last_line = String::new();
            loop {
                let job = orchestrator
                    .get_status(&id)
                    .ok_or_else(|| format!("job {} vanished", id))?;
                let line = format!("{} {}%", job.status, job.progress);
                if line != last_line {
                    eprintln!("{}", line);
                    last_line = line;
                }
                match job.status {
                    JobStatus::Completed => {
                        let path = orchestrator
                            .get_artifact_path(&id)
                            .map_err(|e| e.to_string())?;
                        println!("{}", path.display());
                        return Ok(());
                    }
                    JobStatus::Error => {
                        return Err(job.error.unwrap_or_else(|| "download failed".to_string()));
                    }
                    JobStatus::Preparing | JobStatus::Downloading => {
                        tokio::time::sleep(POLL_INTERVAL).await;
                    }
                }
            }
        }
    }
}
