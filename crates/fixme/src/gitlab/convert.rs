//! Conversion from GitLab payloads to tracker types.

use std::collections::BTreeMap;

use reqwest::header::HeaderMap;

use crate::tracker::{IssuePage, PageCursor, RawIssue, RepoProfile};

use super::types::{GitLabIssue, GitLabProject, ISSUES_PER_PAGE};

pub(crate) fn to_raw_issue(issue: GitLabIssue) -> RawIssue {
    RawIssue {
        remote_id: issue.id,
        number: issue.iid,
        closed: issue.is_closed(),
        title: issue.title,
        body: issue.description,
        url: issue.web_url,
        labels: issue.labels,
        created_at: issue.created_at,
    }
}

/// Page following `page`, if any.
///
/// GitLab sends `x-next-page` empty on the last page. Some instances omit
/// the header for large collections; then a full page implies another.
pub(crate) fn next_page(headers: &HeaderMap, page: u32, count: usize) -> Option<u32> {
    match headers.get("x-next-page").and_then(|v| v.to_str().ok()) {
        Some(value) => value.trim().parse().ok(),
        None if count >= ISSUES_PER_PAGE as usize => Some(page + 1),
        None => None,
    }
}

pub(crate) fn to_issue_page(issues: Vec<GitLabIssue>, next: Option<u32>) -> IssuePage {
    let issues = issues.into_iter().map(to_raw_issue).collect();
    match next {
        Some(n) => IssuePage::with_next(issues, PageCursor::Page(n)),
        None => IssuePage::last(issues),
    }
}

pub(crate) fn to_profile(
    project: GitLabProject,
    readme: Option<String>,
    languages: BTreeMap<String, f64>,
) -> RepoProfile {
    RepoProfile {
        topics: project.topic_names(),
        description: project.description,
        readme,
        languages,
    }
}
