//! GitHub GraphQL client.

use std::sync::Arc;

use async_trait::async_trait;
use octocrab::Octocrab;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::convert::{to_issue_page, to_profile, to_quota};
use super::types::{
    GitHubRateLimitResponse, GraphQlResponse, ISSUE_STATE_QUERY, ISSUES_QUERY,
    IssueStateRepository, IssuesRepository, PROFILE_QUERY, ProfileRepository, RATE_LIMIT_QUERY,
    RateLimitData, RepositoryData,
};
use crate::entity::source_system::SourceSystem;
use crate::tracker::{
    IssuePage, PageCursor, QuotaStatus, RemoteIssueState, RepoProfile, RepoRef, Result,
    TrackerClient, TrackerError,
};

/// Create an authenticated Octocrab instance from a GitHub token.
pub fn create_client(token: &str) -> Result<Octocrab> {
    Octocrab::builder()
        .personal_token(token.to_string())
        .build()
        .map_err(TrackerError::from)
}

/// GitHub tracker client.
///
/// Issue pages come from the GraphQL `issues(last:, before:)` connection,
/// so a repository is walked newest page first.
#[derive(Clone)]
pub struct GitHubClient {
    inner: Arc<Octocrab>,
}

impl GitHubClient {
    /// Create a client authenticated with a personal access token.
    pub fn new(token: &str) -> Result<Self> {
        Ok(Self::from_octocrab(create_client(token)?))
    }

    /// Wrap an existing Octocrab instance (GitHub Enterprise, custom
    /// middleware).
    pub fn from_octocrab(client: Octocrab) -> Self {
        Self {
            inner: Arc::new(client),
        }
    }

    /// Get a reference to the inner Octocrab client.
    pub fn inner(&self) -> &Octocrab {
        &self.inner
    }

    /// Full REST rate limit report, used by `fixme limits`.
    pub async fn rate_limits(&self) -> Result<GitHubRateLimitResponse> {
        self.inner
            .get("/rate_limit", None::<&()>)
            .await
            .map_err(TrackerError::from)
    }

    async fn query<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T> {
        let response: GraphQlResponse<T> = self
            .inner
            .graphql(&json!({ "query": query, "variables": variables }))
            .await?;
        response.into_data()
    }

    async fn query_repository<T: DeserializeOwned>(
        &self,
        repository_url: &str,
        query: &str,
        mut variables: Value,
    ) -> Result<T> {
        let repo = RepoRef::parse(repository_url)?;
        variables["owner"] = json!(repo.owner);
        variables["name"] = json!(repo.name);

        let data: RepositoryData<T> = self.query(query, variables).await?;
        data.repository
            .ok_or_else(|| TrackerError::not_found(repository_url.to_string()))
    }
}

#[async_trait]
impl TrackerClient for GitHubClient {
    fn source_system(&self) -> SourceSystem {
        SourceSystem::GitHub
    }

    async fn fetch_issue_page(
        &self,
        repository_url: &str,
        cursor: Option<&PageCursor>,
    ) -> Result<IssuePage> {
        let before = match cursor {
            None => None,
            Some(PageCursor::Before(c)) => Some(c.as_str()),
            Some(PageCursor::Page(n)) => {
                return Err(TrackerError::api(format!(
                    "GitHub pages by cursor, got page number {n}"
                )));
            }
        };

        let repository: IssuesRepository = self
            .query_repository(repository_url, ISSUES_QUERY, json!({ "cursor": before }))
            .await?;
        let page = to_issue_page(repository.issues);

        tracing::debug!(
            url = repository_url,
            issues = page.issues.len(),
            has_more = page.has_more,
            "Fetched GitHub issue page"
        );
        Ok(page)
    }

    async fn fetch_issue_state(
        &self,
        repository_url: &str,
        number: i64,
    ) -> Result<RemoteIssueState> {
        let repository: IssueStateRepository = self
            .query_repository(repository_url, ISSUE_STATE_QUERY, json!({ "number": number }))
            .await?;

        match repository.issue {
            Some(issue) if issue.closed => Ok(RemoteIssueState::Closed),
            Some(_) => Ok(RemoteIssueState::Open),
            None => Err(TrackerError::not_found(format!("{repository_url}#{number}"))),
        }
    }

    async fn fetch_topics_and_languages(&self, repository_url: &str) -> Result<RepoProfile> {
        let repository: ProfileRepository = self
            .query_repository(repository_url, PROFILE_QUERY, json!({}))
            .await?;
        Ok(to_profile(repository))
    }

    async fn check_quota(&self) -> Result<QuotaStatus> {
        let data: RateLimitData = self.query(RATE_LIMIT_QUERY, json!({})).await?;
        data.rate_limit
            .map(to_quota)
            .ok_or_else(|| TrackerError::decode("rateLimit missing from response"))
    }
}
