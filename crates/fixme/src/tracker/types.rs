use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entity::source_system::SourceSystem;

use super::errors::Result;

/// An issue as reported by the tracker, before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct RawIssue {
    /// Tracker-wide numeric id. Zero means the tracker omitted it.
    pub remote_id: i64,
    /// Per-repository issue number.
    pub number: i64,
    pub title: Option<String>,
    pub body: Option<String>,
    pub url: String,
    pub closed: bool,
    pub labels: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Position in a tracker's issue listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    /// GitHub: walk backwards from this cursor (reverse chronological).
    Before(String),
    /// GitLab: 1-based page number.
    Page(u32),
}

/// One page of issues in the uniform shape consumed by the poller.
#[derive(Debug, Clone, Default)]
pub struct IssuePage {
    pub issues: Vec<RawIssue>,
    pub next_cursor: Option<PageCursor>,
    pub has_more: bool,
}

impl IssuePage {
    /// A terminal page.
    pub fn last(issues: Vec<RawIssue>) -> Self {
        Self {
            issues,
            next_cursor: None,
            has_more: false,
        }
    }

    /// A page followed by another at `cursor`.
    pub fn with_next(issues: Vec<RawIssue>, cursor: PageCursor) -> Self {
        Self {
            issues,
            next_cursor: Some(cursor),
            has_more: true,
        }
    }
}

/// Remote open/closed state of a single issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteIssueState {
    Open,
    Closed,
}

/// Text sources and language breakdown used for technology tagging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepoProfile {
    pub description: Option<String>,
    pub readme: Option<String>,
    pub topics: Vec<String>,
    /// Language name to share of the code base, in percent.
    pub languages: BTreeMap<String, f64>,
}

/// Request quota as reported by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaStatus {
    /// The tracker exposes no quota (GitLab).
    Unmetered,
    Metered {
        remaining: u32,
        reset_at: DateTime<Utc>,
    },
}

impl QuotaStatus {
    /// Whether at least `floor` requests remain.
    pub fn has_capacity(&self, floor: u32) -> bool {
        match self {
            QuotaStatus::Unmetered => true,
            QuotaStatus::Metered { remaining, .. } => *remaining >= floor,
        }
    }
}

/// Uniform contract over a remote issue tracker.
///
/// Repositories are addressed by their web URL; each adapter derives the
/// owner/name or project path it needs via [`super::RepoRef`].
#[async_trait]
pub trait TrackerClient: Send + Sync {
    /// Which tracker this client talks to.
    fn source_system(&self) -> SourceSystem;

    /// Fetch one page of issues. `None` starts from the first page.
    async fn fetch_issue_page(
        &self,
        repository_url: &str,
        cursor: Option<&PageCursor>,
    ) -> Result<IssuePage>;

    /// Current open/closed state of issue `number`.
    async fn fetch_issue_state(
        &self,
        repository_url: &str,
        number: i64,
    ) -> Result<RemoteIssueState>;

    /// Topics, languages, README and description of a repository.
    async fn fetch_topics_and_languages(&self, repository_url: &str) -> Result<RepoProfile>;

    /// Remaining request quota.
    async fn check_quota(&self) -> Result<QuotaStatus>;
}
