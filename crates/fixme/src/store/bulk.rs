use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    sea_query::{Expr, OnConflict},
};
use uuid::Uuid;

use crate::entity::issue::{ActiveModel, Column, Entity as Issue, Model};

use super::errors::Result;

/// Default number of retry attempts for batch writes.
pub const DEFAULT_BATCH_RETRIES: u32 = 3;

/// Default initial backoff delay in milliseconds for batch write retries.
pub const DEFAULT_BATCH_BACKOFF_MS: u64 = 100;

/// Columns a sync is allowed to overwrite on an existing issue.
const CONTENT_COLUMNS: [Column; 11] = [
    Column::Number,
    Column::Title,
    Column::Body,
    Column::Url,
    Column::Closed,
    Column::ExperienceNeeded,
    Column::IssueType,
    Column::Labels,
    Column::Technologies,
    Column::RemoteCreatedAt,
    Column::UpdatedAt,
];

// ─── Bulk Operations ─────────────────────────────────────────────────────────

fn to_active(models: Vec<Model>) -> Vec<ActiveModel> {
    models
        .into_iter()
        .map(|model| ActiveModel::from(model).reset_all())
        .collect()
}

/// ON CONFLICT clause for batch creation.
///
/// A remote id that was inserted by a concurrent page between lookup and
/// insert becomes an update instead of a duplicate.
pub(crate) fn build_create_on_conflict() -> OnConflict {
    OnConflict::columns([Column::SourceSystem, Column::RemoteId])
        .update_columns(CONTENT_COLUMNS)
        .to_owned()
}

/// ON CONFLICT clause for batch update by primary key.
pub(crate) fn build_update_on_conflict() -> OnConflict {
    OnConflict::column(Column::Id)
        .update_columns(CONTENT_COLUMNS)
        .to_owned()
}

/// Insert a batch of new issues in one statement.
pub async fn create_issues(db: &DatabaseConnection, models: Vec<Model>) -> Result<u64> {
    if models.is_empty() {
        return Ok(0);
    }
    let rows = Issue::insert_many(to_active(models))
        .on_conflict(build_create_on_conflict())
        .exec_without_returning(db)
        .await?;
    Ok(rows)
}

/// Overwrite a batch of existing issues in one statement.
pub async fn update_issues(db: &DatabaseConnection, models: Vec<Model>) -> Result<u64> {
    if models.is_empty() {
        return Ok(0);
    }
    let rows = Issue::insert_many(to_active(models))
        .on_conflict(build_update_on_conflict())
        .exec_without_returning(db)
        .await?;
    Ok(rows)
}

/// Mark a batch of issues closed in one statement.
pub async fn close_issues(db: &DatabaseConnection, ids: &[Uuid], at: DateTime<Utc>) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    let result = Issue::update_many()
        .col_expr(Column::Closed, Expr::value(true))
        .col_expr(Column::UpdatedAt, Expr::value(at.fixed_offset()))
        .filter(Column::Id.is_in(ids.iter().copied()))
        .filter(Column::Closed.eq(false))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Run a batch write, retrying transient database errors with exponential
/// backoff.
///
/// # Arguments
/// * `max_retries` - Maximum number of retry attempts (0 = no retries)
/// * `initial_backoff_ms` - Initial backoff delay in milliseconds (doubles each retry)
pub async fn with_batch_retry<F, Fut>(
    label: &str,
    max_retries: u32,
    initial_backoff_ms: u64,
    mut write: F,
) -> Result<u64>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<u64>>,
{
    let mut backoff_ms = initial_backoff_ms;
    let mut attempt = 0;

    loop {
        match write().await {
            Ok(count) => return Ok(count),
            Err(e) if e.is_transient() && attempt < max_retries => {
                attempt += 1;
                tracing::warn!(
                    batch = label,
                    attempt,
                    max_retries,
                    backoff_ms,
                    error = %e,
                    "Batch write failed, retrying..."
                );
                tokio::time::sleep(tokio::time::Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}
