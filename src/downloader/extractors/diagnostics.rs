// Failure diagnostics - maps raw extractor stderr onto a blocking reason
//
// yt-dlp reports everything as free text on stderr. The patterns below are
// checked from most to least specific so that e.g. a DRM notice that also
// mentions "403" is not mistaken for a plain block.

use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static::lazy_static! {
    // `ERROR: [TikTok] 7234291234567890123: ` - the media id must not feed the patterns
    static ref EXTRACTOR_PREFIX_RE: Regex = Regex::new(
        r"(?m)^\s*(?:ERROR:|WARNING:)?\s*\[[^\]]+\]\s+[^\s:]+:\s*"
    ).unwrap();
    static ref DRM_RE: Regex = Regex::new(r"\bdrm\b").unwrap();
    static ref HTTP_429_RE: Regex = Regex::new(r"\b429\b").unwrap();
    static ref HTTP_403_RE: Regex = Regex::new(r"\b403\b").unwrap();
}

/// Reasons a source may refuse or fail a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockingReason {
    /// HTTP 403 Forbidden - general access denied
    Http403Forbidden,

    /// SABR (Segmented Adaptive Bitrate Restreaming) protection
    SabrStreaming,

    /// PO Token (Proof of Origin) required
    PoTokenRequired,

    /// Age-restricted content requiring login
    AgeRestricted,

    /// Geographic restriction
    GeoBlocked,

    /// Network timeout or refused connection
    NetworkTimeout,

    /// Rate limiting (429 or similar)
    RateLimited,

    /// Bot detection triggered
    BotDetection,

    /// Private video requiring authorization
    PrivateVideo,

    /// Video deleted or unavailable
    VideoUnavailable,

    /// DRM-protected or paid content
    DrmProtected,

    /// Member-only content
    MembersOnly,

    /// The extractor binary itself could not be started
    ToolMissing,

    Unknown,
}

impl BlockingReason {
    /// Whether a new attempt has any chance of succeeding
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http403Forbidden
                | Self::SabrStreaming
                | Self::PoTokenRequired
                | Self::NetworkTimeout
                | Self::RateLimited
                | Self::BotDetection
        )
    }

    /// Whether a different client identity might help
    pub fn identity_might_help(&self) -> bool {
        matches!(
            self,
            Self::Http403Forbidden
                | Self::SabrStreaming
                | Self::PoTokenRequired
                | Self::RateLimited
                | Self::BotDetection
        )
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Http403Forbidden => "Access denied (HTTP 403)",
            Self::SabrStreaming => "SABR streaming protection active",
            Self::PoTokenRequired => "Proof of Origin token required",
            Self::AgeRestricted => "Age-restricted content",
            Self::GeoBlocked => "Geographic restriction",
            Self::NetworkTimeout => "Network timeout",
            Self::RateLimited => "Rate limited by source",
            Self::BotDetection => "Bot detection triggered",
            Self::PrivateVideo => "Private video",
            Self::VideoUnavailable => "Video unavailable",
            Self::DrmProtected => "DRM-protected content",
            Self::MembersOnly => "Members-only content",
            Self::ToolMissing => "Extractor not installed",
            Self::Unknown => "Unknown failure",
        }
    }
}

/// Analyze error message and return blocking reason
pub fn diagnose_error(error: &str) -> Option<BlockingReason> {
    if error.trim().is_empty() {
        return None;
    }

    let lower = EXTRACTOR_PREFIX_RE.replace_all(error, "").to_lowercase();

    if lower.contains("no such file or directory")
        || lower.contains("command not found")
        || lower.contains("failed to start")
    {
        return Some(BlockingReason::ToolMissing);
    }

    // DRM and paid content first: permanent, regardless of other noise
    if DRM_RE.is_match(&lower)
        || lower.contains("widevine")
        || lower.contains("playready")
        || lower.contains("fairplay")
        || lower.contains("youtube premium")
        || lower.contains("requires purchase")
        || lower.contains("rent this video")
        || lower.contains("requires payment")
    {
        return Some(BlockingReason::DrmProtected);
    }

    if lower.contains("members only")
        || lower.contains("members-only")
        || lower.contains("join this channel")
        || lower.contains("available to members")
    {
        return Some(BlockingReason::MembersOnly);
    }

    if lower.contains("sabr") {
        return Some(BlockingReason::SabrStreaming);
    }

    if lower.contains("po token") || lower.contains("proof of origin") {
        return Some(BlockingReason::PoTokenRequired);
    }

    if lower.contains("age-restricted")
        || lower.contains("sign in to confirm your age")
        || lower.contains("age_verification")
    {
        return Some(BlockingReason::AgeRestricted);
    }

    if lower.contains("private video")
        || lower.contains("video is private")
        || lower.contains("sign in if you've been granted access")
    {
        return Some(BlockingReason::PrivateVideo);
    }

    if lower.contains("video unavailable")
        || lower.contains("has been removed")
        || lower.contains("no longer available")
        || lower.contains("video is unavailable")
        || lower.contains("http error 404")
    {
        return Some(BlockingReason::VideoUnavailable);
    }

    if lower.contains("not available in your country")
        || lower.contains("blocked in your country")
        || lower.contains("geo restricted")
        || lower.contains("geo-restricted")
    {
        return Some(BlockingReason::GeoBlocked);
    }

    if HTTP_429_RE.is_match(&lower) || lower.contains("rate limit") || lower.contains("too many requests") {
        return Some(BlockingReason::RateLimited);
    }

    if lower.contains("not a bot")
        || lower.contains("captcha")
        || lower.contains("unusual traffic")
        || lower.contains("automated")
    {
        return Some(BlockingReason::BotDetection);
    }

    if HTTP_403_RE.is_match(&lower) || lower.contains("forbidden") {
        return Some(BlockingReason::Http403Forbidden);
    }

    if lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("connection refused")
        || lower.contains("connection reset")
        || lower.contains("network is unreachable")
        || lower.contains("temporary failure in name resolution")
    {
        return Some(BlockingReason::NetworkTimeout);
    }

    Some(BlockingReason::Unknown)
}
