// Platform classification and per-platform capability table
//
// Classification is pure host/path inspection. No network access happens here.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    YouTube,
    Vimeo,
    Dailymotion,
    TikTok,
    Twitter,
    Instagram,
    SoundCloud,
}

impl Platform {
    pub const ALL: [Platform; 7] = [
        Self::YouTube,
        Self::Vimeo,
        Self::Dailymotion,
        Self::TikTok,
        Self::Twitter,
        Self::Instagram,
        Self::SoundCloud,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::YouTube => "YouTube",
            Self::Vimeo => "Vimeo",
            Self::Dailymotion => "Dailymotion",
            Self::TikTok => "TikTok",
            Self::Twitter => "Twitter/X",
            Self::Instagram => "Instagram",
            Self::SoundCloud => "SoundCloud",
        }
    }

    /// Capability row for this platform
    pub fn profile(&self) -> &'static PlatformProfile {
        PROFILES
            .iter()
            .find(|p| p.platform == *self)
            .unwrap_or(&PROFILES[0])
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Options the extraction adapter applies for one platform
#[derive(Debug)]
pub struct PlatformProfile {
    pub platform: Platform,
    /// Canonical hosts, matched exactly or as a dot-suffix
    pub hosts: &'static [&'static str],
    /// Short-link hosts (youtu.be, dai.ly)
    pub short_hosts: &'static [&'static str],
    /// Value for `--extractor-args`
    pub extractor_args: Option<&'static str>,
    pub socket_timeout_secs: u32,
    pub retries: u32,
    pub fragment_retries: u32,
    pub force_ipv4: bool,
    /// Headers sent on top of the rotating identity
    pub extra_headers: &'static [(&'static str, &'static str)],
}

impl PlatformProfile {
    /// Message recorded when every attempt was blocked
    pub fn blocked_message(&self) -> String {
        format!(
            "{} is blocking requests right now. Try again later or try a different {}.",
            self.platform.display_name(),
            match self.platform {
                Platform::SoundCloud => "track",
                Platform::Instagram | Platform::Twitter => "post",
                _ => "video",
            }
        )
    }

    fn matches_host(&self, host: &str) -> bool {
        self.hosts
            .iter()
            .chain(self.short_hosts.iter())
            .any(|h| host_matches(host, h))
    }
}

static PROFILES: [PlatformProfile; 7] = [
    PlatformProfile {
        platform: Platform::YouTube,
        hosts: &["youtube.com", "youtube-nocookie.com"],
        short_hosts: &["youtu.be"],
        extractor_args: Some("youtube:player_client=web,web_safari"),
        socket_timeout_secs: 60,
        retries: 3,
        fragment_retries: 10,
        force_ipv4: true,
        extra_headers: &[("Accept-Language", "en-US,en;q=0.9")],
    },
    PlatformProfile {
        platform: Platform::Vimeo,
        hosts: &["vimeo.com"],
        short_hosts: &[],
        extractor_args: None,
        socket_timeout_secs: 60,
        retries: 3,
        fragment_retries: 10,
        force_ipv4: false,
        extra_headers: &[("Referer", "https://vimeo.com/")],
    },
    PlatformProfile {
        platform: Platform::Dailymotion,
        hosts: &["dailymotion.com"],
        short_hosts: &["dai.ly"],
        extractor_args: None,
        socket_timeout_secs: 60,
        retries: 3,
        fragment_retries: 10,
        force_ipv4: false,
        extra_headers: &[],
    },
    PlatformProfile {
        platform: Platform::TikTok,
        hosts: &["tiktok.com"],
        short_hosts: &["vm.tiktok.com"],
        extractor_args: None,
        socket_timeout_secs: 30,
        retries: 5,
        fragment_retries: 10,
        force_ipv4: false,
        extra_headers: &[("Referer", "https://www.tiktok.com/")],
    },
    PlatformProfile {
        platform: Platform::Twitter,
        hosts: &["twitter.com", "x.com"],
        short_hosts: &["t.co"],
        extractor_args: None,
        socket_timeout_secs: 30,
        retries: 3,
        fragment_retries: 10,
        force_ipv4: false,
        extra_headers: &[],
    },
    PlatformProfile {
        platform: Platform::Instagram,
        hosts: &["instagram.com"],
        short_hosts: &[],
        extractor_args: None,
        socket_timeout_secs: 30,
        retries: 3,
        fragment_retries: 10,
        force_ipv4: false,
        extra_headers: &[],
    },
    PlatformProfile {
        platform: Platform::SoundCloud,
        hosts: &["soundcloud.com"],
        short_hosts: &["on.soundcloud.com"],
        extractor_args: None,
        socket_timeout_secs: 30,
        retries: 3,
        fragment_retries: 10,
        force_ipv4: false,
        extra_headers: &[],
    },
];

/// Exact host or dot-suffix match (`m.youtube.com` matches `youtube.com`,
/// `notyoutube.com` does not).
fn host_matches(host: &str, pattern: &str) -> bool {
    host == pattern
        || host
            .strip_suffix(pattern)
            .map_or(false, |prefix| prefix.ends_with('.'))
}

/// Which platforms the classifier accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierMode {
    /// Any platform in the table, matched by host
    All,
    /// Only the given platform's canonical and short forms, with path checks
    Single(Platform),
}

/// Result of classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Supported(Platform),
    Unsupported,
}

impl Classification {
    pub fn platform(&self) -> Option<Platform> {
        match self {
            Self::Supported(p) => Some(*p),
            Self::Unsupported => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UrlClassifier {
    mode: ClassifierMode,
}

impl UrlClassifier {
    pub fn new(mode: ClassifierMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ClassifierMode {
        self.mode
    }

    /// Label a URL with its platform. Malformed input is `Unsupported`, never an error.
    pub fn classify(&self, url: &str) -> Classification {
        let parsed = match parse_lenient(url) {
            Some(u) => u,
            None => return Classification::Unsupported,
        };
        let host = match parsed.host_str() {
            Some(h) => h.trim_end_matches('.').to_string(),
            None => return Classification::Unsupported,
        };

        match self.mode {
            ClassifierMode::All => PROFILES
                .iter()
                .find(|p| p.matches_host(&host))
                .map(|p| Classification::Supported(p.platform))
                .unwrap_or(Classification::Unsupported),
            ClassifierMode::Single(platform) => {
                let profile = platform.profile();
                if profile.matches_host(&host) && path_is_media(platform, &host, &parsed) {
                    Classification::Supported(platform)
                } else {
                    Classification::Unsupported
                }
            }
        }
    }
}

impl Default for UrlClassifier {
    fn default() -> Self {
        Self::new(ClassifierMode::All)
    }
}

/// Trim, add a scheme when missing, and only accept http(s).
fn parse_lenient(raw: &str) -> Option<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
        return None;
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    let url = Url::parse(&candidate).ok()?;
    match url.scheme() {
        "http" | "https" => Some(url),
        _ => None,
    }
}

/// Path shape checks used in single-platform mode.
fn path_is_media(platform: Platform, host: &str, url: &Url) -> bool {
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    match platform {
        Platform::YouTube => {
            if platform.profile().short_hosts.iter().any(|h| host_matches(host, h)) {
                return segments.len() == 1;
            }
            match segments.as_slice() {
                ["watch"] => url
                    .query_pairs()
                    .any(|(k, v)| k == "v" && !v.is_empty()),
                ["embed", _] | ["shorts", _] | ["live", _] | ["v", _] => true,
                _ => false,
            }
        }
        Platform::Dailymotion => match segments.as_slice() {
            [_] if host_matches(host, "dai.ly") => true,
            ["video", _] | ["embed", "video", _] => true,
            _ => false,
        },
        Platform::Vimeo => segments
            .iter()
            .any(|s| s.chars().all(|c| c.is_ascii_digit())),
        _ => !segments.is_empty(),
    }
}
