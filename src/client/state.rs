// Load state presented to the UI.
// Separates "still loading", "loaded (possibly empty)", and "nothing available".

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::github::RepositorySummary;

use super::fetch::{FetchOptions, Fetched, RepoClient, Source};
use super::local::LocalCacheRecord;

/// A list ready to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoView {
    pub repos: Vec<RepositorySummary>,
    pub source: Source,
    pub generated_at: Option<DateTime<Utc>>,
}

/// Loading state for the repository list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    Loading,
    /// An empty `repos` is a valid result, not a failure.
    Ready(RepoView),
    /// Neither the local cache nor the network produced data.
    Unavailable(String),
}

impl LoadState {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }

    pub fn view(&self) -> Option<&RepoView> {
        match self {
            LoadState::Ready(view) => Some(view),
            _ => None,
        }
    }
}

impl From<LocalCacheRecord> for RepoView {
    fn from(record: LocalCacheRecord) -> Self {
        Self {
            repos: record.repos,
            source: Source::Cache,
            generated_at: record.generated_at,
        }
    }
}

impl From<Fetched> for RepoView {
    fn from(fetched: Fetched) -> Self {
        Self {
            repos: fetched.repos,
            source: fetched.source,
            generated_at: Some(fetched.generated_at),
        }
    }
}

/// Final state once both the cached read and the network fetch have settled.
///
/// Fresh data wins; otherwise the cached list is kept; otherwise the fetch
/// error becomes `Unavailable`.
pub fn resolve(cached: Option<LocalCacheRecord>, fresh: Result<Fetched>) -> LoadState {
    match (fresh, cached) {
        (Ok(fetched), _) => LoadState::Ready(fetched.into()),
        (Err(_), Some(record)) => LoadState::Ready(record.into()),
        (Err(e), None) => LoadState::Unavailable(e.to_string()),
    }
}

impl RepoClient {
    /// Boot sequence: report `Loading`, then any cached list, then the final state.
    pub async fn load(
        &self,
        options: &FetchOptions,
        mut on_update: impl FnMut(&LoadState),
    ) -> LoadState {
        on_update(&LoadState::Loading);

        let cached = self.cache().read().await;
        if let Some(record) = &cached {
            on_update(&LoadState::Ready(record.clone().into()));
        }

        let fresh = self.fetch_fresh(options).await;
        if let Err(e) = &fresh {
            tracing::warn!(error = %e, "repository refresh failed");
        }

        let state = resolve(cached, fresh);
        on_update(&state);
        state
    }
}
