// FormatSelector - turns a (format type, quality hint) pair into an extractor request
//
// Video requests prefer mp4 streams capped at the requested height. If no
// stream fits the cap we take the smallest mp4, and if the source has no mp4
// at all we take whatever it considers best.

use std::path::PathBuf;

use super::models::{FormatType, QualityHint};

/// Post-processing transcode applied after the download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioTranscode {
    Mp3,
}

impl AudioTranscode {
    pub fn codec(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
        }
    }
}

/// Everything the extraction adapter needs to run one download
#[derive(Debug, Clone)]
pub struct FormatRequest {
    pub url: String,
    pub format: FormatType,
    pub quality: QualityHint,
    /// yt-dlp `-f` selector
    pub format_spec: String,
    pub transcode: Option<AudioTranscode>,
    /// Output template, e.g. `/downloads/%(title).100s.%(ext)s`
    pub output_template: PathBuf,
}

pub struct FormatSelector;

impl FormatSelector {
    /// yt-dlp format selector for a request
    pub fn format_spec(format: FormatType, quality: QualityHint) -> String {
        match format {
            FormatType::AudioMp3 => "bestaudio/best".to_string(),
            FormatType::AudioM4a => "bestaudio[ext=m4a]/bestaudio".to_string(),
            FormatType::Video => match quality {
                QualityHint::Best => "best[ext=mp4]/best".to_string(),
                QualityHint::MaxHeight(h) => {
                    format!("best[height<={}][ext=mp4]/worst[ext=mp4]/best", h)
                }
                QualityHint::Worst => "worst[ext=mp4]/best".to_string(),
            },
        }
    }

    pub fn transcode(format: FormatType) -> Option<AudioTranscode> {
        match format {
            FormatType::AudioMp3 => Some(AudioTranscode::Mp3),
            _ => None,
        }
    }

    /// Output template: title truncated to 100 chars, extension from the stream.
    pub fn output_template(download_dir: &std::path::Path) -> PathBuf {
        download_dir.join("%(title).100s.%(ext)s")
    }

    pub fn build(
        url: &str,
        format: FormatType,
        quality: QualityHint,
        download_dir: &std::path::Path,
    ) -> FormatRequest {
        FormatRequest {
            url: url.to_string(),
            format,
            quality,
            format_spec: Self::format_spec(format, quality),
            transcode: Self::transcode(format),
            output_template: Self::output_template(download_dir),
        }
    }
}
