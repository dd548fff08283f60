// GitHub API module.
// Provides the authenticated client and the record types it returns.

pub mod client;
pub mod endpoints;
pub mod types;

pub use client::GitHubClient;
pub use types::*;
