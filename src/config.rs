// Runtime configuration for the gateway, the upstream fetcher, and the client cache.
// Defaults match the reference deployment; the CLI overrides them from flags or env.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, ShelfError};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_PER_PAGE: u32 = 30;
pub const DEFAULT_MAX_REPOS: usize = 16;
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_millis(4000);

pub const DEFAULT_LISTEN: &str = "127.0.0.1:8787";
pub const DEFAULT_FRESH_SECS: u64 = 300;
pub const DEFAULT_STALE_SECS: u64 = 600;

pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_CACHE_KEY: &str = "repos-cache-v1";
pub const DEFAULT_FALLBACK_PER_PAGE: u32 = 12;

/// Settings for talking to the GitHub API.
#[derive(Clone)]
pub struct UpstreamConfig {
    pub api_base: String,
    pub token: String,
    /// Account whose repositories are listed.
    pub user: String,
    /// Page size requested from the API.
    pub per_page: u32,
    /// Number of repositories kept after filtering and sorting.
    pub max_repos: usize,
    pub timeout: Duration,
}

impl UpstreamConfig {
    pub fn new(token: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token: token.into(),
            user: user.into(),
            per_page: DEFAULT_PER_PAGE,
            max_repos: DEFAULT_MAX_REPOS,
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }

    /// Build from the GITHUB_TOKEN environment variable.
    pub fn from_env(user: impl Into<String>) -> Result<Self> {
        let token = std::env::var("GITHUB_TOKEN").map_err(|_| ShelfError::MissingToken)?;
        if token.trim().is_empty() {
            return Err(ShelfError::MissingToken);
        }
        Ok(Self::new(token, user))
    }
}

// The token never reaches logs.
impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("api_base", &self.api_base)
            .field("token", &"<redacted>")
            .field("user", &self.user)
            .field("per_page", &self.per_page)
            .field("max_repos", &self.max_repos)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Settings for the edge gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub listen: SocketAddr,
    /// `max-age` advertised to downstream caches.
    pub fresh_for: Duration,
    /// `stale-while-revalidate` advertised to downstream caches.
    pub stale_for: Duration,
    /// Collapse concurrent background refreshes of one key into a single call.
    pub dedupe_refresh: bool,
}

impl GatewayConfig {
    /// Storage TTL hint for cache entries: fresh window plus stale window.
    pub fn store_ttl(&self) -> Duration {
        self.fresh_for + self.stale_for
    }

    pub fn cache_control(&self) -> String {
        format!(
            "public, max-age={}, stale-while-revalidate={}",
            self.fresh_for.as_secs(),
            self.stale_for.as_secs()
        )
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8787)),
            fresh_for: Duration::from_secs(DEFAULT_FRESH_SECS),
            stale_for: Duration::from_secs(DEFAULT_STALE_SECS),
            dedupe_refresh: true,
        }
    }
}

/// Which endpoint the client fetches fresh data from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Endpoint {
    /// The edge gateway's `/api/repos`.
    Gateway,
    /// The public GitHub API directly, unauthenticated.
    #[default]
    Upstream,
}

/// Settings for the client-side cache and its network refresh.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: Endpoint,
    pub gateway_url: String,
    pub fallback_url: String,
    pub timeout: Duration,
    pub cache_key: String,
    /// Directory backing the persistent store; `None` uses the platform cache dir.
    pub cache_dir: Option<PathBuf>,
}

impl ClientConfig {
    pub fn new(gateway_url: impl Into<String>, user: &str) -> Self {
        Self {
            endpoint: Endpoint::default(),
            gateway_url: gateway_url.into(),
            fallback_url: fallback_url(DEFAULT_API_BASE, user),
            timeout: DEFAULT_CLIENT_TIMEOUT,
            cache_key: DEFAULT_CACHE_KEY.to_string(),
            cache_dir: None,
        }
    }

    /// URL selected by `endpoint`.
    pub fn url(&self) -> &str {
        match self.endpoint {
            Endpoint::Gateway => &self.gateway_url,
            Endpoint::Upstream => &self.fallback_url,
        }
    }
}

/// Direct public API URL used when the gateway is bypassed.
pub fn fallback_url(api_base: &str, user: &str) -> String {
    format!(
        "{}/users/{}/repos?per_page={}&sort=updated",
        api_base.trim_end_matches('/'),
        user,
        DEFAULT_FALLBACK_PER_PAGE
    )
}
