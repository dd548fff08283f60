// Edge cache entries.
// Wraps a payload with the time it was stored and the windows it was stored under.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::github::RepositoryPayload;

/// A stored gateway response. Overwritten wholesale on every refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Key derived from the request URL.
    pub key: String,
    pub payload: RepositoryPayload,
    /// When the entry was written.
    pub stored_at: DateTime<Utc>,
    pub fresh_secs: u64,
    pub revalidate_secs: u64,
}

impl CacheEntry {
    pub fn new(
        key: impl Into<String>,
        payload: RepositoryPayload,
        fresh_for: Duration,
        revalidate_for: Duration,
    ) -> Self {
        Self {
            key: key.into(),
            payload,
            stored_at: Utc::now(),
            fresh_secs: fresh_for.as_secs(),
            revalidate_secs: revalidate_for.as_secs(),
        }
    }

    /// Time since the entry was stored.
    pub fn age(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.stored_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Whether the entry is still inside its freshness window.
    pub fn is_fresh(&self) -> bool {
        self.age() <= Duration::from_secs(self.fresh_secs)
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
