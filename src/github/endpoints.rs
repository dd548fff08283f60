// GitHub API endpoint functions.
// Only the repository listing used by the fetcher is exposed.

use crate::error::Result;

use super::client::GitHubClient;
use super::types::UpstreamRepository;

impl GitHubClient {
    /// List public repositories of a user, most recently updated first.
    ///
    /// The body is decoded through `serde_json` so malformed JSON surfaces as
    /// a parse failure rather than a transport error.
    pub async fn get_user_repos(
        &self,
        user: &str,
        per_page: u32,
    ) -> Result<Vec<UpstreamRepository>> {
        let params = [("per_page", per_page.to_string()), ("sort", "updated".to_string())];
        let response = self
            .get_with_params(&format!("/users/{}/repos", user), &params)
            .await?;
        let body = response.bytes().await?;
        let repos: Vec<UpstreamRepository> = serde_json::from_slice(&body)?;
        Ok(repos)
    }
}
