// Client network refresh.
// Fetches the repository list from the gateway or GitHub directly and refreshes the local cache.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, CACHE_CONTROL, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::debug;

use crate::config::{ClientConfig, Endpoint};
use crate::error::{Result, ShelfError};
use crate::github::RepositorySummary;
use crate::github::types::parse_timestamp;

use super::local::{LocalCache, LocalCacheRecord};

/// Where a rendered list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Network,
}

/// Per-call options for [`RepoClient::fetch_fresh`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub endpoint: Endpoint,
    pub timeout: Duration,
    /// Persist a non-empty result to the local cache.
    pub save_cache: bool,
}

impl From<&ClientConfig> for FetchOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            endpoint: config.endpoint,
            timeout: config.timeout,
            save_cache: true,
        }
    }
}

/// Result of a successful network fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub repos: Vec<RepositorySummary>,
    pub source: Source,
    pub generated_at: DateTime<Utc>,
}

/// Fetches fresh data and keeps the local cache current.
pub struct RepoClient {
    http: reqwest::Client,
    gateway_url: String,
    fallback_url: String,
    cache: LocalCache,
}

impl RepoClient {
    pub fn new(config: &ClientConfig, cache: LocalCache) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(USER_AGENT, HeaderValue::from_static("repo-shelf"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ShelfError::Other(e.to_string()))?;

        Ok(Self {
            http,
            gateway_url: config.gateway_url.clone(),
            fallback_url: config.fallback_url.clone(),
            cache,
        })
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    /// Fetch the list over the network within `options.timeout`.
    ///
    /// A non-empty result is written to the local cache when `save_cache` is
    /// set. Failures are returned to the caller; the cache is left untouched.
    pub async fn fetch_fresh(&self, options: &FetchOptions) -> Result<Fetched> {
        let url = match options.endpoint {
            Endpoint::Gateway => &self.gateway_url,
            Endpoint::Upstream => &self.fallback_url,
        };
        debug!(%url, "fetching repositories");

        let response = self
            .http
            .get(url)
            .timeout(options.timeout)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ShelfError::Upstream {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let (repos, generated_at) = normalize(&body)?;

        if options.save_cache && !repos.is_empty() {
            self.cache.write(&LocalCacheRecord::new(repos.clone())).await;
        }

        Ok(Fetched {
            repos,
            source: Source::Network,
            generated_at: generated_at.unwrap_or_else(Utc::now),
        })
    }
}

/// Accept `[...]` (GitHub) or `{ "repos": [...] }` (gateway). Any other JSON
/// value is an empty list; elements that are not repository-shaped are dropped.
fn normalize(body: &[u8]) -> Result<(Vec<RepositorySummary>, Option<DateTime<Utc>>)> {
    match serde_json::from_slice::<Value>(body)? {
        Value::Array(items) => Ok((RepositorySummary::from_loose(items), None)),
        Value::Object(mut map) => match map.remove("repos") {
            Some(Value::Array(items)) => {
                let generated_at = map
                    .get("generated_at")
                    .and_then(Value::as_str)
                    .and_then(parse_timestamp);
                Ok((RepositorySummary::from_loose(items), generated_at))
            }
            _ => Ok((Vec::new(), None)),
        },
        _ => Ok((Vec::new(), None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn repo_json(name: &str) -> serde_json::Value {
        serde_json::json!({
            "name": name,
            "description": null,
            "html_url": format!("https://github.com/octo/{}", name),
            "stargazers_count": 3,
            "forks_count": 0,
            "open_issues_count": 1,
            "language": null,
            "updated_at": "2024-06-01T12:00:00Z",
            "fork": false
        })
    }

    fn client_for(server: &MockServer) -> RepoClient {
        let mut config = ClientConfig::new(format!("{}/api/repos", server.uri()), "octo");
        config.fallback_url = format!("{}/users/octo/repos", server.uri());
        let cache = LocalCache::new(Arc::new(MemoryStore::new()), "repos-cache-v1");
        RepoClient::new(&config, cache).unwrap()
    }

    fn options(endpoint: Endpoint) -> FetchOptions {
        FetchOptions {
            endpoint,
            timeout: Duration::from_millis(500),
            save_cache: true,
        }
    }

    #[test]
    fn test_normalize_shapes() {
        let list = serde_json::to_vec(&vec![repo_json("a")]).unwrap();
        assert_eq!(normalize(&list).unwrap().0.len(), 1);

        let wrapped = serde_json::to_vec(&serde_json::json!({
            "generated_at": "2024-06-02T00:00:00Z",
            "count": 1,
            "repos": [repo_json("a")]
        }))
        .unwrap();
        let (repos, generated_at) = normalize(&wrapped).unwrap();
        assert_eq!(repos[0].name, "a");
        assert!(generated_at.is_some());

        let sparse = br#"[{"name": "x"}, null]"#;
        let (repos, _) = normalize(sparse).unwrap();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].name, "x");

        let odd = br#"{"message": "hello"}"#;
        assert!(normalize(odd).unwrap().0.is_empty());

        assert!(matches!(normalize(b"not json"), Err(ShelfError::Parse(_))));
    }

    #[tokio::test]
    async fn test_cold_boot_fetch_then_reload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/octo/repos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                repo_json("a"),
                repo_json("b"),
                repo_json("c")
            ])))
            .mount(&server)
            .await;
        let client = client_for(&server);

        assert!(client.cache().read().await.is_none());

        let fetched = client.fetch_fresh(&options(Endpoint::Upstream)).await.unwrap();
        assert_eq!(fetched.repos.len(), 3);
        assert_eq!(fetched.source, Source::Network);

        let reloaded = client.cache().read().await.unwrap();
        assert_eq!(reloaded.repos, fetched.repos);
    }

    #[tokio::test]
    async fn test_gateway_payload_is_unwrapped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/repos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "generated_at": "2024-06-02T00:00:00Z",
                "count": 1,
                "repos": [repo_json("z")]
            })))
            .mount(&server)
            .await;
        let client = client_for(&server);

        let fetched = client.fetch_fresh(&options(Endpoint::Gateway)).await.unwrap();

        assert_eq!(fetched.repos[0].name, "z");
        assert_eq!(fetched.generated_at.to_rfc3339(), "2024-06-02T00:00:00+00:00");
    }

    #[tokio::test]
    async fn test_error_status_leaves_cache_alone() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        let client = client_for(&server);
        client
            .cache()
            .write(&LocalCacheRecord::new(vec![RepositorySummary {
                name: "kept".to_string(),
                description: None,
                html_url: "https://github.com/octo/kept".to_string(),
                star_count: 0,
                fork_count: 0,
                open_issue_count: 0,
                primary_language: None,
                updated_at: Some(Utc::now()),
            }]))
            .await;

        let err = client.fetch_fresh(&options(Endpoint::Upstream)).await.unwrap_err();

        assert!(matches!(err, ShelfError::Upstream { status: 403 }));
        assert_eq!(client.cache().read().await.unwrap().repos[0].name, "kept");
    }

    #[tokio::test]
    async fn test_timeout_is_typed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([]))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;
        let client = client_for(&server);

        let err = client.fetch_fresh(&options(Endpoint::Upstream)).await.unwrap_err();

        assert!(matches!(err, ShelfError::Timeout));
    }

    #[tokio::test]
    async fn test_empty_result_is_not_persisted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;
        let client = client_for(&server);

        let fetched = client.fetch_fresh(&options(Endpoint::Upstream)).await.unwrap();

        assert!(fetched.repos.is_empty());
        assert!(client.cache().read().await.is_none());
    }
}
