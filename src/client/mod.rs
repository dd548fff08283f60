// Client module.
// Local cache for instant first render, network refresh, and the load state handed to the UI.

pub mod fetch;
pub mod local;
pub mod state;

use std::sync::Arc;

use crate::cache::{FileStore, KvStore};
use crate::config::ClientConfig;
use crate::error::{Result, ShelfError};

pub use fetch::{FetchOptions, Fetched, RepoClient, Source};
pub use local::{LocalCache, LocalCacheRecord};
pub use state::{LoadState, RepoView, resolve};

/// Build a client whose local cache lives on disk.
pub fn from_config(config: &ClientConfig) -> Result<RepoClient> {
    let store = match &config.cache_dir {
        Some(dir) => FileStore::new(dir.clone()),
        None => FileStore::in_cache_dir()
            .ok_or_else(|| ShelfError::Other("no cache directory available".to_string()))?,
    };
    let store: Arc<dyn KvStore> = Arc::new(store);
    RepoClient::new(config, LocalCache::new(store, config.cache_key.clone()))
}
