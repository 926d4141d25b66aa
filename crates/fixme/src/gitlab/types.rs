//! GitLab REST v4 payloads.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// GitLab's default and the page size the worker requests.
pub const ISSUES_PER_PAGE: u32 = 20;

/// An issue from `GET /projects/:id/issues`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabIssue {
    /// Instance-wide id.
    pub id: i64,
    /// Per-project number.
    pub iid: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    /// `opened` or `closed`.
    pub state: String,
    pub web_url: String,
    #[serde(default)]
    pub labels: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl GitLabIssue {
    pub fn is_closed(&self) -> bool {
        self.state == "closed"
    }
}

/// The fields of `GET /projects/:id` used for tagging.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabProject {
    pub id: i64,
    pub description: Option<String>,
    pub default_branch: Option<String>,
    /// GitLab 14+.
    #[serde(default)]
    pub topics: Vec<String>,
    /// Deprecated alias of `topics` on older instances.
    #[serde(default)]
    pub tag_list: Vec<String>,
}

impl GitLabProject {
    pub fn topic_names(&self) -> Vec<String> {
        if self.topics.is_empty() {
            self.tag_list.clone()
        } else {
            self.topics.clone()
        }
    }
}
