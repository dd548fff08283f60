// Cache module.
// Key-value stores shared by the edge gateway and the client cache, plus edge entries.

pub mod entry;
pub mod paths;
pub mod store;

pub use entry::CacheEntry;
pub use paths::cache_dir;
pub use store::{FileStore, KvStore, MemoryStore};
