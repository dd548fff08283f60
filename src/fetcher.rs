// Upstream fetcher.
// Pulls the repository list from GitHub and reduces it to the whitelisted payload.

use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::UpstreamConfig;
use crate::error::Result;
use crate::github::{GitHubClient, RepositoryPayload, RepositorySummary, UpstreamRepository};

/// Anything that can produce a fresh payload.
///
/// The gateway only depends on this trait, so tests can swap in slow or
/// failing sources without an HTTP server.
#[async_trait]
pub trait PayloadSource: Send + Sync {
    async fn fetch(&self) -> Result<RepositoryPayload>;
}

/// Fetches from the GitHub API with the configured credential and timeout.
pub struct UpstreamFetcher {
    client: GitHubClient,
    user: String,
    per_page: u32,
    max_repos: usize,
}

impl UpstreamFetcher {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        Ok(Self {
            client: GitHubClient::new(config)?,
            user: config.user.clone(),
            per_page: config.per_page,
            max_repos: config.max_repos,
        })
    }

    pub fn client(&self) -> &GitHubClient {
        &self.client
    }
}

#[async_trait]
impl PayloadSource for UpstreamFetcher {
    async fn fetch(&self) -> Result<RepositoryPayload> {
        let started = Instant::now();
        let records = self.client.get_user_repos(&self.user, self.per_page).await?;
        let payload = RepositoryPayload::new(summarize(&records, self.max_repos));

        let rate_limit = self.client.rate_limit();
        debug!(
            remaining = rate_limit.remaining,
            limit = rate_limit.limit,
            "upstream rate limit"
        );
        info!(
            user = %self.user,
            received = records.len(),
            kept = payload.count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetched repositories from upstream"
        );
        Ok(payload)
    }
}

/// Drop forks, order by most recent update, keep at most `max`, and project
/// each record onto the whitelisted fields.
pub fn summarize(records: &[UpstreamRepository], max: usize) -> Vec<RepositorySummary> {
    let mut kept: Vec<&UpstreamRepository> = records.iter().filter(|r| !r.fork).collect();
    // Stable sort: equal timestamps keep upstream order.
    kept.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    kept.into_iter()
        .take(max)
        .map(RepositorySummary::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShelfError;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(name: &str, fork: bool, updated_at: &str) -> serde_json::Value {
        serde_json::json!({
            "name": name,
            "description": format!("{} repo", name),
            "html_url": format!("https://github.com/octo/{}", name),
            "stargazers_count": 1,
            "forks_count": 0,
            "open_issues_count": 0,
            "language": "Rust",
            "updated_at": updated_at,
            "fork": fork,
            "private": false
        })
    }

    fn records(values: Vec<serde_json::Value>) -> Vec<UpstreamRepository> {
        serde_json::from_value(serde_json::Value::Array(values)).unwrap()
    }

    fn config_for(server: &MockServer) -> UpstreamConfig {
        let mut config = UpstreamConfig::new("test-token", "octo");
        config.api_base = server.uri();
        config.timeout = Duration::from_millis(300);
        config
    }

    #[test]
    fn test_summarize_filters_forks_and_sorts() {
        let input = records(vec![
            record("a", false, "2024-01-02"),
            record("b", true, "2024-01-03"),
            record("c", false, "2024-01-01"),
        ]);

        let payload = RepositoryPayload::new(summarize(&input, 16));
        let names: Vec<&str> = payload.repos.iter().map(|r| r.name.as_str()).collect();

        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(payload.count, 2);
    }

    #[test]
    fn test_summarize_truncates_and_keeps_invariants() {
        let input = records(
            (0..40)
                .map(|i| {
                    let day = format!("2024-02-{:02}", (i % 28) + 1);
                    record(&format!("r{}", i), i % 5 == 0, &day)
                })
                .collect(),
        );

        let payload = RepositoryPayload::new(summarize(&input, 16));

        assert_eq!(payload.count, payload.repos.len());
        assert!(payload.repos.len() <= 16);
        assert!(
            payload
                .repos
                .windows(2)
                .all(|w| w[0].updated_at >= w[1].updated_at)
        );
        let fork_names: Vec<String> = input
            .iter()
            .filter(|r| r.fork)
            .map(|r| r.name.clone())
            .collect();
        assert!(payload.repos.iter().all(|r| !fork_names.contains(&r.name)));
    }

    #[test]
    fn test_summarize_is_idempotent() {
        let input = records(vec![
            record("x", false, "2024-03-01T00:00:00Z"),
            record("y", false, "2024-03-02T00:00:00Z"),
        ]);

        assert_eq!(summarize(&input, 16), summarize(&input, 16));
    }

    #[tokio::test]
    async fn test_fetch_sends_credentials_and_builds_payload() {
        let server = MockServer::start().await;
        let body = serde_json::Value::Array(vec![
            record("a", false, "2024-01-02"),
            record("b", true, "2024-01-03"),
            record("c", false, "2024-01-01"),
        ]);

        Mock::given(method("GET"))
            .and(path("/users/octo/repos"))
            .and(query_param("per_page", "30"))
            .and(query_param("sort", "updated"))
            .and(header("authorization", "Bearer test-token"))
            .and(header("accept", "application/vnd.github+json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(&body)
                    .insert_header("x-ratelimit-remaining", "4999")
                    .insert_header("x-ratelimit-limit", "5000"),
            )
            .mount(&server)
            .await;

        let fetcher = UpstreamFetcher::new(&config_for(&server)).unwrap();
        let payload = fetcher.fetch().await.unwrap();

        assert_eq!(payload.count, 2);
        assert_eq!(payload.repos[0].name, "a");
        assert_eq!(fetcher.client().rate_limit().remaining, 4999);
    }

    #[tokio::test]
    async fn test_fetch_maps_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let fetcher = UpstreamFetcher::new(&config_for(&server)).unwrap();
        let err = fetcher.fetch().await.unwrap_err();

        assert!(matches!(err, ShelfError::Upstream { status: 502 }));
    }

    #[tokio::test]
    async fn test_fetch_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([]))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let fetcher = UpstreamFetcher::new(&config_for(&server)).unwrap();
        let err = fetcher.fetch().await.unwrap_err();

        assert!(matches!(err, ShelfError::Timeout));
    }

    #[tokio::test]
    async fn test_fetch_reports_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let fetcher = UpstreamFetcher::new(&config_for(&server)).unwrap();
        let err = fetcher.fetch().await.unwrap_err();

        assert!(matches!(err, ShelfError::Parse(_)));
    }

    #[tokio::test]
    async fn test_fetch_reports_network_failure() {
        let mut config = UpstreamConfig::new("t", "octo");
        // Port 9 (discard) is closed on test hosts.
        config.api_base = "http://127.0.0.1:9".to_string();
        config.timeout = Duration::from_millis(500);

        let fetcher = UpstreamFetcher::new(&config).unwrap();
        let err = fetcher.fetch().await.unwrap_err();

        assert!(matches!(err, ShelfError::Network(_) | ShelfError::Timeout));
    }
}
