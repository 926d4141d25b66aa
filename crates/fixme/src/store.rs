//! Persistence for projects, repositories and issues.
//!
//! The sync components talk to storage through the [`IssueStore`] trait;
//! [`DbStore`] implements it over a sea-orm connection. The free functions
//! in the submodules are usable directly against any `DatabaseConnection`.

mod bulk;
mod errors;
mod query;
mod update;

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::entity::issue::Model as IssueModel;
use crate::entity::repository::Model as RepositoryModel;
use crate::entity::source_system::SourceSystem;

pub use bulk::{
    DEFAULT_BATCH_BACKOFF_MS, DEFAULT_BATCH_RETRIES, close_issues, create_issues, update_issues,
    with_batch_retry,
};
pub use errors::{Result, StoreError};
pub use query::{
    count_open_issues, find_issues_by_remote_ids, least_recently_parsed, repositories_by_source,
    repositories_for_project, stale_open_issues,
};
pub use update::{
    mark_parsed, set_project_issues_count, set_project_profile, set_repository_issue_count,
    set_repository_tags,
};

/// Storage operations needed by the pollers, reconciler and sweeper.
#[async_trait]
pub trait IssueStore: Send + Sync {
    /// Repository of `source` with the oldest `last_parsed`, if any.
    async fn least_recently_parsed(&self, source: SourceSystem) -> Result<Option<RepositoryModel>>;

    async fn repositories_by_source(&self, source: SourceSystem) -> Result<Vec<RepositoryModel>>;

    async fn repositories_for_project(&self, project_id: Uuid) -> Result<Vec<RepositoryModel>>;

    /// Stored issues of `source` among `remote_ids`.
    async fn find_issues(&self, source: SourceSystem, remote_ids: &[i64])
    -> Result<Vec<IssueModel>>;

    /// Insert a batch of new issues in one statement.
    async fn create_issues(&self, batch: Vec<IssueModel>) -> Result<u64>;

    /// Overwrite a batch of existing issues in one statement.
    async fn update_issues(&self, batch: Vec<IssueModel>) -> Result<u64>;

    /// Live count of open issues in a repository.
    async fn count_open_issues(&self, repository_id: Uuid) -> Result<i64>;

    async fn set_repository_issue_count(&self, repository_id: Uuid, count: i64) -> Result<()>;

    async fn set_project_issues_count(&self, project_id: Uuid, count: i64) -> Result<()>;

    /// Stamp a completed walk. Never moves `last_parsed` backwards.
    async fn mark_parsed(
        &self,
        repository_id: Uuid,
        project_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Open issues of a repository last touched before `older_than`.
    async fn stale_open_issues(
        &self,
        repository_id: Uuid,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<IssueModel>>;

    /// Close a batch of issues in one statement.
    async fn close_issues(&self, ids: &[Uuid], at: DateTime<Utc>) -> Result<u64>;

    async fn set_repository_tags(&self, repository_id: Uuid, tags: &BTreeSet<String>)
    -> Result<()>;

    /// Store a project's tags. `languages` of `None` keeps the stored
    /// breakdown.
    async fn set_project_profile(
        &self,
        project_id: Uuid,
        tags: &BTreeSet<String>,
        languages: Option<&BTreeMap<String, f64>>,
    ) -> Result<()>;
}

/// [`IssueStore`] backed by a sea-orm connection.
#[derive(Debug)]
pub struct DbStore {
    db: DatabaseConnection,
    batch_retries: u32,
    batch_backoff_ms: u64,
}

impl DbStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            batch_retries: DEFAULT_BATCH_RETRIES,
            batch_backoff_ms: DEFAULT_BATCH_BACKOFF_MS,
        }
    }

    /// Override the retry policy for batch writes.
    pub fn with_batch_retry(mut self, retries: u32, initial_backoff_ms: u64) -> Self {
        self.batch_retries = retries;
        self.batch_backoff_ms = initial_backoff_ms;
        self
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl IssueStore for DbStore {
    async fn least_recently_parsed(&self, source: SourceSystem) -> Result<Option<RepositoryModel>> {
        query::least_recently_parsed(&self.db, source).await
    }

    async fn repositories_by_source(&self, source: SourceSystem) -> Result<Vec<RepositoryModel>> {
        query::repositories_by_source(&self.db, source).await
    }

    async fn repositories_for_project(&self, project_id: Uuid) -> Result<Vec<RepositoryModel>> {
        query::repositories_for_project(&self.db, project_id).await
    }

    async fn find_issues(
        &self,
        source: SourceSystem,
        remote_ids: &[i64],
    ) -> Result<Vec<IssueModel>> {
        query::find_issues_by_remote_ids(&self.db, source, remote_ids).await
    }

    async fn create_issues(&self, batch: Vec<IssueModel>) -> Result<u64> {
        with_batch_retry("create", self.batch_retries, self.batch_backoff_ms, || {
            bulk::create_issues(&self.db, batch.clone())
        })
        .await
    }

    async fn update_issues(&self, batch: Vec<IssueModel>) -> Result<u64> {
        with_batch_retry("update", self.batch_retries, self.batch_backoff_ms, || {
            bulk::update_issues(&self.db, batch.clone())
        })
        .await
    }

    async fn count_open_issues(&self, repository_id: Uuid) -> Result<i64> {
        query::count_open_issues(&self.db, repository_id).await
    }

    async fn set_repository_issue_count(&self, repository_id: Uuid, count: i64) -> Result<()> {
        update::set_repository_issue_count(&self.db, repository_id, count).await
    }

    async fn set_project_issues_count(&self, project_id: Uuid, count: i64) -> Result<()> {
        update::set_project_issues_count(&self.db, project_id, count).await
    }

    async fn mark_parsed(
        &self,
        repository_id: Uuid,
        project_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<()> {
        update::mark_parsed(&self.db, repository_id, project_id, at).await
    }

    async fn stale_open_issues(
        &self,
        repository_id: Uuid,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<IssueModel>> {
        query::stale_open_issues(&self.db, repository_id, older_than).await
    }

    async fn close_issues(&self, ids: &[Uuid], at: DateTime<Utc>) -> Result<u64> {
        with_batch_retry("close", self.batch_retries, self.batch_backoff_ms, || {
            bulk::close_issues(&self.db, ids, at)
        })
        .await
    }

    async fn set_repository_tags(
        &self,
        repository_id: Uuid,
        tags: &BTreeSet<String>,
    ) -> Result<()> {
        update::set_repository_tags(&self.db, repository_id, tags).await
    }

    async fn set_project_profile(
        &self,
        project_id: Uuid,
        tags: &BTreeSet<String>,
        languages: Option<&BTreeMap<String, f64>>,
    ) -> Result<()> {
        update::set_project_profile(&self.db, project_id, tags, languages).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult};
    use serde_json::json;

    use super::*;

    fn repository(url: &str, last_parsed: DateTime<Utc>) -> RepositoryModel {
        let now = Utc::now().fixed_offset();
        RepositoryModel {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            source_system: SourceSystem::GitLab,
            repository_url: url.to_string(),
            issue_count: 0,
            tags: json!(["Rails"]),
            last_parsed: last_parsed.fixed_offset(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn not_found_error_names_kind_and_id() {
        let id = Uuid::new_v4();
        let msg = StoreError::not_found_by_id("project", id).to_string();
        assert!(msg.contains("not found"));
        assert!(msg.contains("project"));
        assert!(msg.contains(&id.to_string()));
    }

    #[test]
    fn db_error_converts_and_classifies() {
        let err: StoreError = DbErr::Conn(sea_orm::RuntimeErr::Internal(
            "connection refused".to_string(),
        ))
        .into();
        assert!(err.to_string().contains("Database error"));
        assert!(err.is_transient());

        let err: StoreError = DbErr::RecordNotFound("x".to_string()).into();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn least_recently_parsed_returns_first_row() {
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        let oldest = repository("https://gitlab.com/g/p", epoch);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![oldest.clone()]])
            .into_connection();
        let store = DbStore::new(db);

        let found = store
            .least_recently_parsed(SourceSystem::GitLab)
            .await
            .unwrap();
        assert_eq!(found, Some(oldest));

        let log = store.db.into_transaction_log();
        let sql = format!("{:?}", log[0]);
        assert!(sql.contains("ORDER BY"));
        assert!(sql.contains("last_parsed"));
        assert!(sql.contains("LIMIT"));
    }

    #[tokio::test]
    async fn least_recently_parsed_empty_table() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([Vec::<RepositoryModel>::new()])
            .into_connection();
        let store = DbStore::new(db);

        assert!(
            store
                .least_recently_parsed(SourceSystem::GitHub)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn set_repository_issue_count_reports_missing_row() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_exec_results([MockExecResult {
                rows_affected: 0,
                last_insert_id: 0,
            }])
            .into_connection();
        let store = DbStore::new(db);

        let err = store
            .set_repository_issue_count(Uuid::new_v4(), 4)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn mark_parsed_only_moves_forward() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([
                MockExecResult {
                    rows_affected: 1,
                    last_insert_id: 0,
                },
                MockExecResult {
                    rows_affected: 1,
                    last_insert_id: 0,
                },
            ])
            .into_connection();
        let store = DbStore::new(db);

        store
            .mark_parsed(Uuid::new_v4(), Uuid::new_v4(), Utc::now())
            .await
            .unwrap();

        let log = store.db.into_transaction_log();
        assert_eq!(log.len(), 2);
        let repo_sql = format!("{:?}", log[0]);
        let project_sql = format!("{:?}", log[1]);
        assert!(repo_sql.contains("repositories"));
        assert!(repo_sql.contains("last_parsed"));
        assert!(!repo_sql.contains("IS NULL"));
        assert!(project_sql.contains("projects"));
        assert!(project_sql.contains("IS NULL"));
    }

    #[tokio::test]
    async fn project_profile_without_languages_leaves_column() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                rows_affected: 1,
                last_insert_id: 0,
            }])
            .into_connection();
        let store = DbStore::new(db);
        let tags = BTreeSet::from(["Rust".to_string()]);

        store
            .set_project_profile(Uuid::new_v4(), &tags, None)
            .await
            .unwrap();

        let sql = format!("{:?}", store.db.into_transaction_log()[0]);
        assert!(sql.contains("\"tags\""));
        assert!(!sql.contains("\"languages\""));
    }

    #[tokio::test]
    async fn find_issues_splits_long_id_lists() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<IssueModel>::new(), Vec::<IssueModel>::new()])
            .into_connection();
        let store = DbStore::new(db);
        let ids: Vec<i64> = (1..=501).collect();

        let found = store.find_issues(SourceSystem::GitHub, &ids).await.unwrap();

        assert!(found.is_empty());
        assert_eq!(store.db.into_transaction_log().len(), 2);
    }

    #[tokio::test]
    async fn find_issues_without_ids_skips_query() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let store = DbStore::new(db);

        let found = store.find_issues(SourceSystem::GitHub, &[]).await.unwrap();
        assert!(found.is_empty());
        assert!(store.db.into_transaction_log().is_empty());
    }
}
