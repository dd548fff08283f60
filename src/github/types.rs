// GitHub API response types and the wire payload served to browsers.
// Upstream records are deserialized loosely; summaries are the whitelisted projection.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Repository record as returned by `GET /users/{user}/repos`.
///
/// Only the fields the projection reads are declared; everything else the API
/// sends is dropped at deserialization time.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamRepository {
    pub name: String,
    pub description: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub open_issues_count: u64,
    pub language: Option<String>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub fork: bool,
}

/// Whitelisted projection of one upstream repository.
///
/// Serialized with the GitHub field names so that browsers can render either
/// a gateway payload or a raw API response with the same code. Every field
/// defaults, so records written by older clients still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySummary {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub html_url: String,
    #[serde(rename = "stargazers_count", default)]
    pub star_count: u64,
    #[serde(rename = "forks_count", default)]
    pub fork_count: u64,
    #[serde(rename = "open_issues_count", default)]
    pub open_issue_count: u64,
    #[serde(rename = "language", default)]
    pub primary_language: Option<String>,
    #[serde(default, deserialize_with = "deserialize_loose_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RepositorySummary {
    /// Project a loosely-typed list, dropping elements that are not repository-shaped.
    pub fn from_loose(items: Vec<serde_json::Value>) -> Vec<Self> {
        items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect()
    }
}

impl From<&UpstreamRepository> for RepositorySummary {
    fn from(repo: &UpstreamRepository) -> Self {
        Self {
            name: repo.name.clone(),
            description: repo.description.clone(),
            html_url: repo.html_url.clone(),
            star_count: repo.stargazers_count,
            fork_count: repo.forks_count,
            open_issue_count: repo.open_issues_count,
            primary_language: repo.language.clone(),
            updated_at: Some(repo.updated_at),
        }
    }
}

/// The unit cached at the edge and sent over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryPayload {
    pub generated_at: DateTime<Utc>,
    pub count: usize,
    pub repos: Vec<RepositorySummary>,
}

impl RepositoryPayload {
    /// Wrap summaries with a fresh timestamp. `count` always mirrors `repos`.
    pub fn new(repos: Vec<RepositorySummary>) -> Self {
        Self {
            generated_at: Utc::now(),
            count: repos.len(),
            repos,
        }
    }
}

/// Rate limit information from response headers.
#[derive(Debug, Clone, Default)]
pub struct RateLimit {
    pub limit: u64,
    pub remaining: u64,
    pub reset: u64,
}

/// Accept RFC 3339 timestamps, and bare `YYYY-MM-DD` dates as midnight UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| serde::de::Error::custom(format!("bad timestamp: {raw}")))
}

/// Unparseable or non-string timestamps become `None`.
fn deserialize_loose_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(raw.as_str().and_then(parse_timestamp))
}

/// Deserialize a field that must be a sequence, keeping only the elements that project.
pub(crate) fn deserialize_loose_list<'de, D>(
    deserializer: D,
) -> Result<Vec<RepositorySummary>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(RepositorySummary::from_loose(items))
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
