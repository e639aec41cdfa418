// Configuration loaded from `<config dir>/media-grabber/config.toml`

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::downloader::identity::DEFAULT_USER_AGENTS;
use crate::downloader::platform::{ClassifierMode, Platform};
use crate::downloader::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config directory available on this system")]
    NoConfigDir,

    #[error("config I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Which platforms the classifier accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformMode {
    #[default]
    All,
    Single,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per job, including the first
    pub max_attempts: u32,
    /// Pause before retrying a transient failure
    pub transient_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            transient_delay_ms: 1500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrabberConfig {
    pub download_dir: PathBuf,
    /// Explicit yt-dlp binary; discovered when unset
    pub ytdlp_path: Option<PathBuf>,
    /// HTTP/SOCKS proxy handed to the extractor
    pub proxy: Option<String>,
    pub platform_mode: PlatformMode,
    /// Required when `platform_mode = "single"`
    pub single_platform: Option<Platform>,
    pub retry: RetryConfig,
    pub verify_grace_ms: u64,
    /// Hard cap per download attempt. Unset means no cap.
    pub attempt_timeout_secs: Option<u64>,
    pub metadata_timeout_secs: u64,
    /// How long finished jobs stay queryable
    pub job_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub user_agents: Vec<String>,
}

impl Default for GrabberConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            ytdlp_path: None,
            proxy: None,
            platform_mode: PlatformMode::All,
            single_platform: None,
            retry: RetryConfig::default(),
            verify_grace_ms: 1000,
            attempt_timeout_secs: None,
            metadata_timeout_secs: 30,
            job_ttl_secs: 3600,
            sweep_interval_secs: 60,
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .map(|d| d.join("media-grabber"))
        .unwrap_or_else(|| PathBuf::from("downloads"))
}

impl GrabberConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        if self.platform_mode == PlatformMode::Single && self.single_platform.is_none() {
            return Err(ConfigError::Invalid(
                "platform_mode = \"single\" needs single_platform".into(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid("sweep_interval_secs must be positive".into()));
        }
        if self.user_agents.len() < 2 {
            tracing::warn!(
                count = self.user_agents.len(),
                "fewer than two user agents configured; blocked retries will reuse the same identity"
            );
        }
        Ok(())
    }

    pub fn classifier_mode(&self) -> ClassifierMode {
        match (self.platform_mode, self.single_platform) {
            (PlatformMode::Single, Some(p)) => ClassifierMode::Single(p),
            _ => ClassifierMode::All,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts.max(1),
            transient_delay: Duration::from_millis(self.retry.transient_delay_ms),
        }
    }

    pub fn verify_grace(&self) -> Duration {
        Duration::from_millis(self.verify_grace_ms)
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_secs.map(Duration::from_secs)
    }

    pub fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.job_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

pub fn config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|d| d.join("media-grabber").join("config.toml"))
        .ok_or(ConfigError::NoConfigDir)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<GrabberConfig, ConfigError> {
    let path = config_path()?;
    load_or_init_at(&path)
}

pub fn load_or_init_at(path: &Path) -> Result<GrabberConfig, ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    if !path.exists() {
        let default_cfg = GrabberConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, toml).map_err(io_err)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path).map_err(io_err)?;
    let cfg: GrabberConfig = toml::from_str(&data)?;
    cfg.validate()?;
    Ok(cfg)
}
