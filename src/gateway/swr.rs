// Stale-while-revalidate core of the edge gateway.
// Warm keys are answered from the store and refreshed in a detached task; cold keys fetch inline.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, KvStore};
use crate::config::GatewayConfig;
use crate::error::Result;
use crate::fetcher::PayloadSource;
use crate::github::RepositoryPayload;

/// Whether a response came from the store or from upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_header(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// A payload ready to be written to the response.
#[derive(Debug, Clone)]
pub struct Served {
    pub payload: RepositoryPayload,
    pub status: CacheStatus,
    /// Age of the stored entry; zero on a miss.
    pub age: Duration,
}

/// Keys with a background refresh currently running.
type InFlight = Arc<Mutex<HashSet<String>>>;

/// SWR gateway over one store and one payload source. Cheap to clone.
#[derive(Clone)]
pub struct Gateway {
    store: Arc<dyn KvStore>,
    source: Arc<dyn PayloadSource>,
    config: Arc<GatewayConfig>,
    in_flight: InFlight,
}

impl Gateway {
    pub fn new(
        store: Arc<dyn KvStore>,
        source: Arc<dyn PayloadSource>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            store,
            source,
            config: Arc::new(config),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Answer a request for `key`.
    ///
    /// Warm: returns the stored payload without touching upstream on the
    /// request path, and schedules a refresh. Cold: fetches, stores, returns;
    /// a failed fetch is returned as an error and nothing is stored.
    pub async fn serve(&self, key: &str) -> Result<Served> {
        if let Some(entry) = self.lookup(key).await {
            debug!(%key, fresh = entry.is_fresh(), "cache hit");
            self.spawn_refresh(key);
            return Ok(Served {
                age: entry.age(),
                payload: entry.payload,
                status: CacheStatus::Hit,
            });
        }

        debug!(%key, "cache miss");
        let payload = self.source.fetch().await.inspect_err(|e| {
            warn!(%key, error = %e, "cold fetch failed");
        })?;
        store_payload(self.store.as_ref(), &self.config, key, payload.clone()).await;

        Ok(Served {
            payload,
            status: CacheStatus::Miss,
            age: Duration::ZERO,
        })
    }

    /// Read and decode the entry for `key`. Store and decode failures count as a miss.
    async fn lookup(&self, key: &str) -> Option<CacheEntry> {
        let bytes = match self.store.get(key).await {
            Ok(bytes) => bytes?,
            Err(e) => {
                warn!(%key, error = %e, "cache read failed");
                return None;
            }
        };
        match CacheEntry::from_bytes(&bytes) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(%key, error = %e, "discarding undecodable cache entry");
                None
            }
        }
    }

    /// Detach a refresh of `key`. The task is never awaited and outlives the request.
    fn spawn_refresh(&self, key: &str) {
        let guard = if self.config.dedupe_refresh {
            match RefreshGuard::acquire(&self.in_flight, key) {
                Some(guard) => Some(guard),
                None => {
                    debug!(%key, "refresh already in flight");
                    return;
                }
            }
        } else {
            None
        };

        let store = Arc::clone(&self.store);
        let source = Arc::clone(&self.source);
        let config = Arc::clone(&self.config);
        let key = key.to_string();

        tokio::spawn(async move {
            let _guard = guard;
            match source.fetch().await {
                Ok(payload) => {
                    store_payload(store.as_ref(), &config, &key, payload).await;
                    info!(%key, "background refresh stored");
                }
                Err(e) => warn!(%key, error = %e, "background refresh failed; keeping stale entry"),
            }
        });
    }
}

/// Overwrite the entry for `key`. Failures are logged; the caller already has its payload.
async fn store_payload(
    store: &dyn KvStore,
    config: &GatewayConfig,
    key: &str,
    payload: RepositoryPayload,
) {
    let entry = CacheEntry::new(key, payload, config.fresh_for, config.stale_for);
    let bytes = match entry.to_bytes() {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(%key, error = %e, "failed to encode cache entry");
            return;
        }
    };
    if let Err(e) = store.put(key, bytes, Some(config.store_ttl())).await {
        warn!(%key, error = %e, "cache write failed");
    }
}

/// Membership of a key in the in-flight set, released on drop.
struct RefreshGuard {
    in_flight: InFlight,
    key: String,
}

impl RefreshGuard {
    fn acquire(in_flight: &InFlight, key: &str) -> Option<Self> {
        let mut keys = in_flight.lock().ok()?;
        if !keys.insert(key.to_string()) {
            return None;
        }
        Some(Self {
            in_flight: Arc::clone(in_flight),
            key: key.to_string(),
        })
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        if let Ok(mut keys) = self.in_flight.lock() {
            keys.remove(&self.key);
        }
    }
}
