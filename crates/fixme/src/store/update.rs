use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, sea_query::Expr,
};
use uuid::Uuid;

use crate::entity::project::{Column as ProjectColumn, Entity as Project};
use crate::entity::repository::{Column as RepositoryColumn, Entity as Repository};

use super::errors::{Result, StoreError};

// ─── Aggregate Updates ───────────────────────────────────────────────────────

pub async fn set_repository_issue_count(
    db: &DatabaseConnection,
    repository_id: Uuid,
    count: i64,
) -> Result<()> {
    let result = Repository::update_many()
        .col_expr(RepositoryColumn::IssueCount, Expr::value(count))
        .col_expr(RepositoryColumn::UpdatedAt, Expr::value(now()))
        .filter(RepositoryColumn::Id.eq(repository_id))
        .exec(db)
        .await?;
    require_row(result.rows_affected, "repository", repository_id)
}

pub async fn set_project_issues_count(
    db: &DatabaseConnection,
    project_id: Uuid,
    count: i64,
) -> Result<()> {
    let result = Project::update_many()
        .col_expr(ProjectColumn::IssuesCount, Expr::value(count))
        .col_expr(ProjectColumn::UpdatedAt, Expr::value(now()))
        .filter(ProjectColumn::Id.eq(project_id))
        .exec(db)
        .await?;
    require_row(result.rows_affected, "project", project_id)
}

/// Stamp a completed walk on the repository and its project.
///
/// Only moves `last_parsed` forward; an older stamp from a slow concurrent
/// sync is ignored.
pub async fn mark_parsed(
    db: &DatabaseConnection,
    repository_id: Uuid,
    project_id: Uuid,
    at: DateTime<Utc>,
) -> Result<()> {
    let at = at.fixed_offset();

    Repository::update_many()
        .col_expr(RepositoryColumn::LastParsed, Expr::value(at))
        .filter(RepositoryColumn::Id.eq(repository_id))
        .filter(RepositoryColumn::LastParsed.lt(at))
        .exec(db)
        .await?;

    Project::update_many()
        .col_expr(ProjectColumn::LastParsed, Expr::value(Some(at)))
        .filter(ProjectColumn::Id.eq(project_id))
        .filter(
            Condition::any()
                .add(ProjectColumn::LastParsed.is_null())
                .add(ProjectColumn::LastParsed.lt(at)),
        )
        .exec(db)
        .await?;

    Ok(())
}

pub async fn set_repository_tags(
    db: &DatabaseConnection,
    repository_id: Uuid,
    tags: &BTreeSet<String>,
) -> Result<()> {
    let result = Repository::update_many()
        .col_expr(RepositoryColumn::Tags, Expr::value(serde_json::json!(tags)))
        .col_expr(RepositoryColumn::UpdatedAt, Expr::value(now()))
        .filter(RepositoryColumn::Id.eq(repository_id))
        .exec(db)
        .await?;
    require_row(result.rows_affected, "repository", repository_id)
}

pub async fn set_project_profile(
    db: &DatabaseConnection,
    project_id: Uuid,
    tags: &BTreeSet<String>,
    languages: Option<&BTreeMap<String, f64>>,
) -> Result<()> {
    let mut update = Project::update_many()
        .col_expr(ProjectColumn::Tags, Expr::value(serde_json::json!(tags)))
        .col_expr(ProjectColumn::UpdatedAt, Expr::value(now()));
    if let Some(languages) = languages {
        update = update.col_expr(
            ProjectColumn::Languages,
            Expr::value(serde_json::json!(languages)),
        );
    }
    let result = update
        .filter(ProjectColumn::Id.eq(project_id))
        .exec(db)
        .await?;
    require_row(result.rows_affected, "project", project_id)
}

fn now() -> chrono::DateTime<chrono::FixedOffset> {
    Utc::now().fixed_offset()
}

fn require_row(rows_affected: u64, kind: &str, id: Uuid) -> Result<()> {
    if rows_affected == 0 {
        return Err(StoreError::not_found_by_id(kind, id));
    }
    Ok(())
}
