//! GitHub GraphQL documents and response shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tracker::{Result, TrackerError};

/// Issues per GraphQL page.
pub const ISSUES_PER_PAGE: u32 = 100;

pub(crate) const ISSUES_QUERY: &str = r#"
query($owner: String!, $name: String!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    issues(last: 100, before: $cursor) {
      nodes {
        title
        body
        closed
        number
        url
        createdAt
        databaseId
        labels(first: 100) { nodes { name } }
      }
      pageInfo { startCursor hasPreviousPage }
    }
  }
}"#;

pub(crate) const ISSUE_STATE_QUERY: &str = r#"
query($owner: String!, $name: String!, $number: Int!) {
  repository(owner: $owner, name: $name) {
    issue(number: $number) { closed }
  }
}"#;

pub(crate) const PROFILE_QUERY: &str = r#"
query($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    description
    object(expression: "HEAD:README.md") { ... on Blob { text } }
    repositoryTopics(first: 100) { nodes { topic { name } } }
    languages(first: 100, orderBy: {field: SIZE, direction: DESC}) {
      totalSize
      edges { size node { name } }
    }
  }
}"#;

pub(crate) const RATE_LIMIT_QUERY: &str = "query { rateLimit { remaining resetAt } }";

// ─── Envelope ────────────────────────────────────────────────────────────────

/// Top-level GraphQL response.
#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlError {
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl<T> GraphQlResponse<T> {
    /// Unwrap `data`, turning a non-empty `errors` array into a tracker error.
    pub(crate) fn into_data(self) -> Result<T> {
        if let Some(first) = self.errors.first() {
            match first.kind.as_deref() {
                Some("NOT_FOUND") => return Err(TrackerError::not_found(first.message.clone())),
                Some("RATE_LIMITED") => {
                    return Err(TrackerError::RateLimited {
                        reset_at: Utc::now() + chrono::Duration::minutes(1),
                    });
                }
                _ => {}
            }
            let messages: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(TrackerError::api(messages.join("; ")));
        }
        self.data
            .ok_or_else(|| TrackerError::decode("GraphQL response without data"))
    }
}

/// `{ repository: ... }` wrapper shared by the repository-scoped queries.
#[derive(Debug, Deserialize)]
pub(crate) struct RepositoryData<T> {
    pub repository: Option<T>,
}

// ─── Issues ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct IssuesRepository {
    pub issues: IssueConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IssueConnection {
    #[serde(default)]
    pub nodes: Vec<Option<IssueNode>>,
    pub page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IssueNode {
    pub title: Option<String>,
    pub body: Option<String>,
    pub closed: bool,
    pub number: i64,
    pub url: String,
    pub created_at: Option<DateTime<Utc>>,
    pub database_id: Option<i64>,
    pub labels: Option<LabelConnection>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LabelConnection {
    #[serde(default)]
    pub nodes: Vec<Option<NamedNode>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NamedNode {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PageInfo {
    pub start_cursor: Option<String>,
    pub has_previous_page: bool,
}

// ─── Issue state ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct IssueStateRepository {
    pub issue: Option<IssueStateNode>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IssueStateNode {
    pub closed: bool,
}

// ─── Profile ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProfileRepository {
    pub description: Option<String>,
    pub object: Option<BlobNode>,
    pub repository_topics: Option<TopicConnection>,
    pub languages: Option<LanguageConnection>,
}

/// `object(expression:)` resolves to a Blob or nothing; non-blob objects
/// come back as `{}`.
#[derive(Debug, Deserialize)]
pub(crate) struct BlobNode {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TopicConnection {
    #[serde(default)]
    pub nodes: Vec<Option<TopicNode>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TopicNode {
    pub topic: NamedNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LanguageConnection {
    pub total_size: i64,
    #[serde(default)]
    pub edges: Vec<Option<LanguageEdge>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LanguageEdge {
    pub size: i64,
    pub node: NamedNode,
}

// ─── Rate limit ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RateLimitData {
    pub rate_limit: Option<RateLimitNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RateLimitNode {
    pub remaining: i64,
    pub reset_at: DateTime<Utc>,
}

/// A single entry of the REST `/rate_limit` report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitResource {
    /// Maximum requests allowed per period.
    pub limit: usize,
    /// Requests used in current period.
    pub used: usize,
    /// Remaining requests in current period.
    pub remaining: usize,
    /// Unix timestamp when the rate limit resets.
    pub reset: u64,
}

impl RateLimitResource {
    /// Get the reset time as a DateTime.
    pub fn reset_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.reset as i64, 0).unwrap_or_else(Utc::now)
    }
}

/// The resources the worker spends quota on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRateLimits {
    /// Core REST API.
    pub core: RateLimitResource,
    /// Search API.
    pub search: RateLimitResource,
    /// GraphQL API. Every issue, state and profile query draws from this.
    #[serde(default)]
    pub graphql: Option<RateLimitResource>,
}

/// Full rate limit response from GitHub's API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRateLimitResponse {
    pub resources: GitHubRateLimits,
}
