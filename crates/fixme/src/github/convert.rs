//! Conversion from GraphQL nodes to tracker types.

use std::collections::BTreeMap;

use crate::tracker::{IssuePage, PageCursor, QuotaStatus, RawIssue, RepoProfile};

use super::types::{IssueConnection, IssueNode, LanguageConnection, ProfileRepository, RateLimitNode};

/// Convert an issue node. A missing `databaseId` becomes 0, which the
/// reconciler rejects.
pub(crate) fn to_raw_issue(node: IssueNode) -> RawIssue {
    let labels = node
        .labels
        .map(|conn| conn.nodes.into_iter().flatten().map(|l| l.name).collect())
        .unwrap_or_default();

    RawIssue {
        remote_id: node.database_id.unwrap_or(0),
        number: node.number,
        title: node.title,
        body: node.body,
        url: node.url,
        closed: node.closed,
        labels,
        created_at: node.created_at,
    }
}

/// Convert one `issues(last:, before:)` connection.
///
/// The walk runs backwards, so the next cursor is this page's start cursor.
pub(crate) fn to_issue_page(connection: IssueConnection) -> IssuePage {
    let issues: Vec<RawIssue> = connection
        .nodes
        .into_iter()
        .flatten()
        .map(to_raw_issue)
        .collect();

    match connection.page_info.start_cursor {
        Some(cursor) if connection.page_info.has_previous_page => {
            IssuePage::with_next(issues, PageCursor::Before(cursor))
        }
        _ => IssuePage::last(issues),
    }
}

/// Language name to percentage of `totalSize`.
pub(crate) fn language_shares(connection: LanguageConnection) -> BTreeMap<String, f64> {
    if connection.total_size <= 0 {
        return BTreeMap::new();
    }
    let total = connection.total_size as f64;
    connection
        .edges
        .into_iter()
        .flatten()
        .map(|edge| (edge.node.name, edge.size as f64 * 100.0 / total))
        .collect()
}

pub(crate) fn to_profile(repository: ProfileRepository) -> RepoProfile {
    RepoProfile {
        description: repository.description,
        readme: repository.object.and_then(|blob| blob.text),
        topics: repository
            .repository_topics
            .map(|conn| {
                conn.nodes
                    .into_iter()
                    .flatten()
                    .map(|n| n.topic.name)
                    .collect()
            })
            .unwrap_or_default(),
        languages: repository.languages.map(language_shares).unwrap_or_default(),
    }
}

pub(crate) fn to_quota(node: RateLimitNode) -> QuotaStatus {
    QuotaStatus::Metered {
        remaining: node.remaining.clamp(0, i64::from(u32::MAX)) as u32,
        reset_at: node.reset_at,
    }
}
