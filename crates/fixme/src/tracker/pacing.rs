use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use crate::entity::source_system::SourceSystem;

use super::errors::Result;
use super::types::{IssuePage, PageCursor, QuotaStatus, RemoteIssueState, RepoProfile, TrackerClient};

/// Type alias for the governor rate limiter.
type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default request pacing per tracker (requests per second).
pub mod rate_limits {
    use crate::entity::source_system::SourceSystem;

    /// GitHub: 5000 points/hour, bursts are cheap.
    pub const GITHUB_DEFAULT_RPS: u32 = 10;
    /// GitLab: 2000 requests/minute on gitlab.com, self-hosted varies.
    pub const GITLAB_DEFAULT_RPS: u32 = 5;

    /// Default pacing for a source system.
    pub fn default_rps(source: SourceSystem) -> u32 {
        match source {
            SourceSystem::GitHub => GITHUB_DEFAULT_RPS,
            SourceSystem::GitLab => GITLAB_DEFAULT_RPS,
        }
    }
}

fn build_limiter(requests_per_second: u32) -> GovernorRateLimiter {
    let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
    RateLimiter::direct(Quota::per_second(rps))
}

/// A standalone request pacer.
///
/// ```ignore
/// let limiter = ApiRateLimiter::new(10);
/// limiter.wait().await;
/// client.fetch_issue_page(url, None).await?;
/// ```
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
}

impl ApiRateLimiter {
    /// `requests_per_second` of 0 is treated as 1.
    pub fn new(requests_per_second: u32) -> Self {
        Self {
            inner: Arc::new(build_limiter(requests_per_second)),
        }
    }

    /// Wait until a request is allowed.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }
}

/// A paced wrapper around any [`TrackerClient`].
///
/// Every call waits on a shared governor quota before delegating, so the
/// sweeper's burst of status lookups cannot trip secondary rate limits.
pub struct RateLimitedClient<C> {
    inner: C,
    limiter: ApiRateLimiter,
}

impl<C> RateLimitedClient<C> {
    pub fn new(inner: C, requests_per_second: u32) -> Self {
        Self {
            inner,
            limiter: ApiRateLimiter::new(requests_per_second),
        }
    }

    /// Get a reference to the inner client.
    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: Clone> Clone for RateLimitedClient<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            limiter: self.limiter.clone(),
        }
    }
}

#[async_trait]
impl<C: TrackerClient> TrackerClient for RateLimitedClient<C> {
    fn source_system(&self) -> SourceSystem {
        self.inner.source_system()
    }

    async fn fetch_issue_page(
        &self,
        repository_url: &str,
        cursor: Option<&PageCursor>,
    ) -> Result<IssuePage> {
        self.limiter.wait().await;
        self.inner.fetch_issue_page(repository_url, cursor).await
    }

    async fn fetch_issue_state(
        &self,
        repository_url: &str,
        number: i64,
    ) -> Result<RemoteIssueState> {
        self.limiter.wait().await;
        self.inner.fetch_issue_state(repository_url, number).await
    }

    async fn fetch_topics_and_languages(&self, repository_url: &str) -> Result<RepoProfile> {
        self.limiter.wait().await;
        self.inner.fetch_topics_and_languages(repository_url).await
    }

    async fn check_quota(&self) -> Result<QuotaStatus> {
        self.limiter.wait().await;
        self.inner.check_quota().await
    }
}
