//! GitLab REST client.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use super::convert::{next_page, to_issue_page, to_profile};
use super::types::{GitLabIssue, GitLabProject, ISSUES_PER_PAGE};
use crate::entity::source_system::SourceSystem;
use crate::tracker::{
    IssuePage, PageCursor, QuotaStatus, RemoteIssueState, RepoProfile, RepoRef, Result,
    TrackerClient, TrackerError,
};

/// gitlab.com.
pub const DEFAULT_HOST: &str = "https://gitlab.com";

/// Request timeout.
const TIMEOUT_SECS: u64 = 30;

/// GitLab tracker client authenticated with a personal access token.
#[derive(Debug, Clone)]
pub struct GitLabClient {
    client: Client,
    base_url: String,
}

/// `gitlab.example.com`, `https://gitlab.example.com/` → `https://gitlab.example.com`.
pub(crate) fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

/// URL-encoded `group/subgroup/name` path used as the `:id` of project
/// endpoints.
pub(crate) fn project_id(repository_url: &str) -> Result<String> {
    let repo = RepoRef::parse(repository_url)?;
    Ok(urlencoding::encode(&repo.path).into_owned())
}

impl GitLabClient {
    /// Create a client for `host` (e.g. "gitlab.com" or
    /// "https://gitlab.example.com").
    pub fn new(host: &str, token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let token_value = HeaderValue::from_str(token)
            .map_err(|_| TrackerError::auth("Invalid token format"))?;
        headers.insert("PRIVATE-TOKEN", token_value);
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(concat!("fixme/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(TIMEOUT_SECS))
            .build()
            .map_err(|e| TrackerError::network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: normalize_host(host),
        })
    }

    /// Get the host URL.
    pub fn host(&self) -> &str {
        &self.base_url
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/api/v4{}", self.base_url, endpoint)
    }

    async fn send(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Response> {
        let response = self
            .client
            .get(self.api_url(endpoint))
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(endpoint, %status, "GitLab request failed");
        Err(TrackerError::from_status(status, &body))
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self.send(endpoint, query).await?;
        response.json::<T>().await.map_err(TrackerError::from)
    }

    /// README.md at `git_ref`. Missing files are `None`.
    async fn readme(&self, id: &str, git_ref: &str) -> Result<Option<String>> {
        let endpoint = format!("/projects/{id}/repository/files/README.md/raw");
        match self.send(&endpoint, &[("ref", git_ref.to_string())]).await {
            Ok(response) => Ok(Some(response.text().await?)),
            Err(TrackerError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl TrackerClient for GitLabClient {
    fn source_system(&self) -> SourceSystem {
        SourceSystem::GitLab
    }

    async fn fetch_issue_page(
        &self,
        repository_url: &str,
        cursor: Option<&PageCursor>,
    ) -> Result<IssuePage> {
        let page = match cursor {
            None => 1,
            Some(PageCursor::Page(n)) => *n,
            Some(PageCursor::Before(c)) => {
                return Err(TrackerError::api(format!(
                    "GitLab pages by number, got cursor {c}"
                )));
            }
        };

        let id = project_id(repository_url)?;
        let response = self
            .send(
                &format!("/projects/{id}/issues"),
                &[
                    ("state", "opened".to_string()),
                    ("per_page", ISSUES_PER_PAGE.to_string()),
                    ("page", page.to_string()),
                ],
            )
            .await?;

        let headers = response.headers().clone();
        let issues: Vec<GitLabIssue> = response.json().await?;
        let next = next_page(&headers, page, issues.len());

        tracing::debug!(
            url = repository_url,
            page,
            issues = issues.len(),
            next_page = ?next,
            "Fetched GitLab issue page"
        );
        Ok(to_issue_page(issues, next))
    }

    async fn fetch_issue_state(
        &self,
        repository_url: &str,
        number: i64,
    ) -> Result<RemoteIssueState> {
        let id = project_id(repository_url)?;
        let issue: GitLabIssue = self
            .get(&format!("/projects/{id}/issues/{number}"), &[])
            .await?;
        Ok(if issue.is_closed() {
            RemoteIssueState::Closed
        } else {
            RemoteIssueState::Open
        })
    }

    async fn fetch_topics_and_languages(&self, repository_url: &str) -> Result<RepoProfile> {
        let id = project_id(repository_url)?;
        let project: GitLabProject = self.get(&format!("/projects/{id}"), &[]).await?;

        let git_ref = project.default_branch.as_deref().unwrap_or("HEAD");
        let readme = self.readme(&id, git_ref).await?;
        let languages: BTreeMap<String, f64> = self
            .get(&format!("/projects/{id}/languages"), &[])
            .await?;

        Ok(to_profile(project, readme, languages))
    }

    async fn check_quota(&self) -> Result<QuotaStatus> {
        Ok(QuotaStatus::Unmetered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("gitlab.com"), "https://gitlab.com");
        assert_eq!(
            normalize_host("https://gitlab.example.com/"),
            "https://gitlab.example.com"
        );
        assert_eq!(normalize_host("http://localhost:8080"), "http://localhost:8080");
    }

    #[test]
    fn test_project_id_encodes_full_path() {
        assert_eq!(
            project_id("https://gitlab.com/gnome/apps/nautilus").unwrap(),
            "gnome%2Fapps%2Fnautilus"
        );
        assert!(project_id("https://gitlab.com/lonely").is_err());
    }

    #[test]
    fn test_api_url() {
        let client = GitLabClient::new("gitlab.com", "glpat-test").unwrap();
        assert_eq!(
            client.api_url("/projects/g%2Fp/issues"),
            "https://gitlab.com/api/v4/projects/g%2Fp/issues"
        );
        assert_eq!(client.source_system(), SourceSystem::GitLab);
    }

    #[test]
    fn test_rejects_unprintable_token() {
        assert!(matches!(
            GitLabClient::new("gitlab.com", "bad\ntoken"),
            Err(TrackerError::Auth { .. })
        ));
    }

    #[tokio::test]
    async fn test_quota_is_unmetered() {
        let client = GitLabClient::new(DEFAULT_HOST, "glpat-test").unwrap();
        assert_eq!(client.check_quota().await.unwrap(), QuotaStatus::Unmetered);
    }

    #[tokio::test]
    async fn test_cursor_is_rejected() {
        let client = GitLabClient::new(DEFAULT_HOST, "glpat-test").unwrap();
        let err = client
            .fetch_issue_page(
                "https://gitlab.com/g/p",
                Some(&PageCursor::Before("abc".to_string())),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::Api { .. }));
    }
}
