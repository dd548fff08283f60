// repo-shelf: stale-while-revalidate gateway and local cache for a GitHub repository list.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod gateway;
pub mod github;

pub use error::{Result, ShelfError};
