use std::sync::Arc;

use crate::entity::repository::Model as RepositoryModel;
use crate::store::IssueStore;

use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::AggregateCounts;

/// Recomputes denormalized open-issue counts after a repository sync.
pub struct AggregateMaintainer<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for AggregateMaintainer<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: IssueStore + ?Sized> AggregateMaintainer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Refresh the repository's open count from a live query, then set the
    /// project's count to the sum over all its repositories.
    ///
    /// Failures are logged and reflected as `None` in the result; they never
    /// propagate.
    pub async fn recount(
        &self,
        repository: &RepositoryModel,
        on_progress: Option<&ProgressCallback>,
    ) -> AggregateCounts {
        let mut counts = AggregateCounts::default();

        let open_issues = match self.store.count_open_issues(repository.id).await {
            Ok(count) => count,
            Err(e) => {
                warn(
                    on_progress,
                    format!(
                        "Failed to count open issues for {}: {}",
                        repository.repository_url, e
                    ),
                );
                return counts;
            }
        };

        match self
            .store
            .set_repository_issue_count(repository.id, open_issues)
            .await
        {
            Ok(()) => counts.open_issues = Some(open_issues),
            Err(e) => warn(
                on_progress,
                format!(
                    "Failed to store issue count for {}: {}",
                    repository.repository_url, e
                ),
            ),
        }

        match self.project_total(repository, open_issues).await {
            Ok(total) => {
                match self
                    .store
                    .set_project_issues_count(repository.project_id, total)
                    .await
                {
                    Ok(()) => counts.project_issues = Some(total),
                    Err(e) => warn(
                        on_progress,
                        format!(
                            "Failed to store issue count for project {}: {}",
                            repository.project_id, e
                        ),
                    ),
                }
            }
            Err(e) => warn(
                on_progress,
                format!(
                    "Failed to load repositories of project {}: {}",
                    repository.project_id, e
                ),
            ),
        }

        tracing::debug!(
            repository_id = %repository.id,
            open_issues,
            project_issues = ?counts.project_issues,
            "Updated aggregate counts"
        );
        emit(
            on_progress,
            SyncProgress::CountsUpdated {
                repository_id: repository.id,
                open_issues,
                project_issues: counts.project_issues,
            },
        );

        counts
    }

    /// Sum of sibling counts, using the fresh count for `repository` itself.
    async fn project_total(
        &self,
        repository: &RepositoryModel,
        open_issues: i64,
    ) -> crate::store::Result<i64> {
        let siblings = self
            .store
            .repositories_for_project(repository.project_id)
            .await?;

        Ok(siblings
            .iter()
            .filter(|sibling| sibling.id != repository.id)
            .map(|sibling| sibling.issue_count)
            .sum::<i64>()
            + open_issues)
    }
}

fn warn(on_progress: Option<&ProgressCallback>, message: String) {
    tracing::warn!("{}", message);
    emit(on_progress, SyncProgress::Warning { message });
}
