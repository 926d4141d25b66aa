use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use uuid::Uuid;

use crate::entity::issue::{Column as IssueColumn, Entity as Issue, Model as IssueModel};
use crate::entity::repository::{
    Column as RepositoryColumn, Entity as Repository, Model as RepositoryModel,
};
use crate::entity::source_system::SourceSystem;

use super::errors::Result;

/// Upper bound on ids bound into a single `IN (...)` list.
const MAX_IN_LIST: usize = 500;

// ─── Query Operations ────────────────────────────────────────────────────────

/// The repository of `source` with the oldest `last_parsed`.
pub async fn least_recently_parsed(
    db: &DatabaseConnection,
    source: SourceSystem,
) -> Result<Option<RepositoryModel>> {
    Ok(Repository::find()
        .filter(RepositoryColumn::SourceSystem.eq(source))
        .order_by_asc(RepositoryColumn::LastParsed)
        .one(db)
        .await?)
}

pub async fn repositories_by_source(
    db: &DatabaseConnection,
    source: SourceSystem,
) -> Result<Vec<RepositoryModel>> {
    Ok(Repository::find()
        .filter(RepositoryColumn::SourceSystem.eq(source))
        .order_by_asc(RepositoryColumn::ProjectId)
        .all(db)
        .await?)
}

pub async fn repositories_for_project(
    db: &DatabaseConnection,
    project_id: Uuid,
) -> Result<Vec<RepositoryModel>> {
    Ok(Repository::find()
        .filter(RepositoryColumn::ProjectId.eq(project_id))
        .all(db)
        .await?)
}

/// Issues of `source` whose remote id is in `remote_ids`.
pub async fn find_issues_by_remote_ids(
    db: &DatabaseConnection,
    source: SourceSystem,
    remote_ids: &[i64],
) -> Result<Vec<IssueModel>> {
    let mut found = Vec::with_capacity(remote_ids.len());
    for chunk in remote_ids.chunks(MAX_IN_LIST) {
        let mut rows = Issue::find()
            .filter(IssueColumn::SourceSystem.eq(source))
            .filter(IssueColumn::RemoteId.is_in(chunk.iter().copied()))
            .all(db)
            .await?;
        found.append(&mut rows);
    }
    Ok(found)
}

/// Live count of open issues in a repository.
pub async fn count_open_issues(db: &DatabaseConnection, repository_id: Uuid) -> Result<i64> {
    let count = Issue::find()
        .filter(IssueColumn::RepositoryId.eq(repository_id))
        .filter(IssueColumn::Closed.eq(false))
        .count(db)
        .await?;
    Ok(i64::try_from(count).unwrap_or(i64::MAX))
}

/// Open issues of a repository not touched since `older_than`.
pub async fn stale_open_issues(
    db: &DatabaseConnection,
    repository_id: Uuid,
    older_than: DateTime<Utc>,
) -> Result<Vec<IssueModel>> {
    Ok(Issue::find()
        .filter(IssueColumn::RepositoryId.eq(repository_id))
        .filter(IssueColumn::Closed.eq(false))
        .filter(IssueColumn::UpdatedAt.lt(older_than.fixed_offset()))
        .order_by_asc(IssueColumn::UpdatedAt)
        .all(db)
        .await?)
}
