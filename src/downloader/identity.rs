// Client identities presented to the source, and per-job rotation

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// User agent plus header set for one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_agent: String,
    pub headers: Vec<(String, String)>,
}

impl Identity {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

pub const DEFAULT_USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
];

/// Header sets matching `DEFAULT_USER_AGENTS` entry by entry. Safari sends no client hints.
const DEFAULT_HEADER_SETS: [&[(&str, &str)]; 4] = [
    &[
        ("Accept-Language", "en-US,en;q=0.9"),
        ("Sec-CH-UA", "\"Google Chrome\";v=\"119\", \"Chromium\";v=\"119\", \"Not?A_Brand\";v=\"24\""),
        ("Sec-CH-UA-Platform", "\"Windows\""),
    ],
    &[
        ("Accept-Language", "en-GB,en;q=0.8"),
        ("Sec-CH-UA", "\"Chromium\";v=\"118\", \"Google Chrome\";v=\"118\", \"Not=A?Brand\";v=\"99\""),
        ("Sec-CH-UA-Platform", "\"Windows\""),
    ],
    &[
        ("Accept-Language", "en-US,en;q=0.8,de;q=0.6"),
        ("Sec-CH-UA", "\"Not A(Brand\";v=\"99\", \"Google Chrome\";v=\"121\", \"Chromium\";v=\"121\""),
        ("Sec-CH-UA-Platform", "\"macOS\""),
    ],
    &[("Accept-Language", "en-CA,en;q=0.9")],
];

/// Accept-Language values cycled over configured agents we have no header set for
const ACCEPT_LANGUAGES: [&str; 4] = [
    "en-US,en;q=0.9",
    "en-GB,en;q=0.8",
    "en-US,en;q=0.7,fr;q=0.5",
    "en-AU,en;q=0.9",
];

impl Identity {
    /// Identity for a configured agent. Known agents get their full header
    /// set; others get an Accept-Language picked by position in the pool.
    pub fn for_user_agent(user_agent: &str, index: usize) -> Self {
        if let Some(pos) = DEFAULT_USER_AGENTS.iter().position(|ua| *ua == user_agent) {
            return default_identity(pos);
        }
        Identity::new(user_agent)
            .with_header("Accept-Language", ACCEPT_LANGUAGES[index % ACCEPT_LANGUAGES.len()])
    }

    /// Case-insensitive header lookup
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

fn default_identity(pos: usize) -> Identity {
    DEFAULT_HEADER_SETS[pos]
        .iter()
        .fold(Identity::new(DEFAULT_USER_AGENTS[pos]), |id, (name, value)| {
            id.with_header(*name, *value)
        })
}

/// Shared pool of identities. Each job walks it in order starting at a
/// different offset, so consecutive attempts of one job never reuse an identity
/// while the pool has at least two distinct entries.
#[derive(Debug)]
pub struct IdentityPool {
    identities: Arc<[Identity]>,
    next_start: AtomicUsize,
}

impl IdentityPool {
    /// Empty input falls back to the built-in agents.
    pub fn new(identities: Vec<Identity>) -> Self {
        let identities = if identities.is_empty() {
            default_identities()
        } else {
            identities
        };
        if identities.len() < 2 {
            tracing::warn!(
                pool_size = identities.len(),
                "identity pool has fewer than two entries; rotation cannot change identity"
            );
        }
        Self {
            identities: identities.into(),
            next_start: AtomicUsize::new(0),
        }
    }

    pub fn from_user_agents<S: AsRef<str>>(agents: &[S]) -> Self {
        Self::new(
            agents
                .iter()
                .enumerate()
                .map(|(i, ua)| Identity::for_user_agent(ua.as_ref(), i))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Rotation state for a new job
    pub fn rotation(&self) -> IdentityRotation {
        let start = self.next_start.fetch_add(1, Ordering::Relaxed) % self.identities.len();
        IdentityRotation {
            identities: Arc::clone(&self.identities),
            index: start,
        }
    }
}

impl Default for IdentityPool {
    fn default() -> Self {
        Self::new(default_identities())
    }
}

fn default_identities() -> Vec<Identity> {
    (0..DEFAULT_USER_AGENTS.len()).map(default_identity).collect()
}

/// Per-job cursor into the pool
#[derive(Debug, Clone)]
pub struct IdentityRotation {
    identities: Arc<[Identity]>,
    index: usize,
}

impl IdentityRotation {
    pub fn current(&self) -> &Identity {
        &self.identities[self.index]
    }

    /// Advance to the next distinct identity and return it.
    pub fn rotate(&mut self) -> &Identity {
        let len = self.identities.len();
        let from = self.index;
        for step in 1..=len {
            let candidate = (from + step) % len;
            if self.identities[candidate] != self.identities[from] {
                self.index = candidate;
                return &self.identities[self.index];
            }
        }
        // Every entry is identical; nothing to rotate to.
        &self.identities[self.index]
    }
}
