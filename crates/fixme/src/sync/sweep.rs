use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::entity::repository::Model as RepositoryModel;
use crate::retry::with_retry;
use crate::store::IssueStore;
use crate::tracker::{RemoteIssueState, TrackerClient, TrackerError, short_error_message};

use super::locks::IssueLocks;
use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::SweepReport;

/// Re-verifies stale open issues and closes those gone upstream.
///
/// A remote lookup that still fails after retries counts as closed. This
/// prunes dangling rows at the cost of wrongly closing issues during a
/// prolonged tracker outage.
pub struct Sweeper<C: ?Sized, S: ?Sized> {
    tracker: Arc<C>,
    store: Arc<S>,
    locks: Arc<IssueLocks>,
    stale_window: Duration,
}

impl<C: ?Sized, S: ?Sized> Clone for Sweeper<C, S> {
    fn clone(&self) -> Self {
        Self {
            tracker: Arc::clone(&self.tracker),
            store: Arc::clone(&self.store),
            locks: Arc::clone(&self.locks),
            stale_window: self.stale_window,
        }
    }
}

impl<C, S> Sweeper<C, S>
where
    C: TrackerClient + ?Sized,
    S: IssueStore + ?Sized,
{
    pub fn new(
        tracker: Arc<C>,
        store: Arc<S>,
        locks: Arc<IssueLocks>,
        stale_window: Duration,
    ) -> Self {
        Self {
            tracker,
            store,
            locks,
            stale_window,
        }
    }

    /// Sweep the open issues of `repository` not updated within the window.
    ///
    /// All closures are written in one batch at the end. Errors are logged;
    /// the report reflects whatever was achieved.
    pub async fn sweep(
        &self,
        repository: &RepositoryModel,
        on_progress: Option<&ProgressCallback>,
    ) -> SweepReport {
        let mut report = SweepReport::default();
        let window =
            chrono::Duration::from_std(self.stale_window).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now() - window;

        let stale = match self.store.stale_open_issues(repository.id, cutoff).await {
            Ok(stale) => stale,
            Err(e) => {
                tracing::warn!(
                    url = %repository.repository_url,
                    error = %e,
                    "Failed to load stale issues"
                );
                return report;
            }
        };

        let mut to_close = HashSet::new();
        for issue in &stale {
            report.examined += 1;
            match self.lookup(&repository.repository_url, issue.number).await {
                Ok(RemoteIssueState::Open) => {}
                Ok(RemoteIssueState::Closed) => {
                    to_close.insert(issue.remote_id);
                }
                Err(e) => {
                    tracing::debug!(
                        url = %repository.repository_url,
                        number = issue.number,
                        error = %short_error_message(&e),
                        "Issue lookup failed, assuming closed"
                    );
                    report.lookup_failures += 1;
                    to_close.insert(issue.remote_id);
                }
            }
        }

        if !to_close.is_empty() {
            report.closed = self.close(repository, &to_close, cutoff).await;
        }

        tracing::info!(
            url = %repository.repository_url,
            examined = report.examined,
            closed = report.closed,
            lookup_failures = report.lookup_failures,
            "Sweep complete"
        );
        emit(
            on_progress,
            SyncProgress::SweepComplete {
                repository_id: repository.id,
                examined: report.examined,
                closed: report.closed,
            },
        );

        report
    }

    async fn lookup(
        &self,
        repository_url: &str,
        number: i64,
    ) -> Result<RemoteIssueState, TrackerError> {
        with_retry(
            || self.tracker.fetch_issue_state(repository_url, number),
            TrackerError::is_transient,
            "issue state lookup",
        )
        .await
    }

    /// Close the chosen issues under their locks. Issues the reconciler
    /// touched since selection are left alone.
    async fn close(
        &self,
        repository: &RepositoryModel,
        remote_ids: &HashSet<i64>,
        cutoff: chrono::DateTime<Utc>,
    ) -> usize {
        let remote_ids: Vec<i64> = remote_ids.iter().copied().collect();
        let _guards = self.locks.lock_many(remote_ids.iter().copied()).await;

        let current = match self
            .store
            .find_issues(repository.source_system, &remote_ids)
            .await
        {
            Ok(current) => current,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to re-read issues before closing");
                return 0;
            }
        };

        let ids: Vec<_> = current
            .iter()
            .filter(|issue| !issue.closed && issue.updated_at.with_timezone(&Utc) < cutoff)
            .map(|issue| issue.id)
            .collect();

        match self.store.close_issues(&ids, Utc::now()).await {
            Ok(closed) => usize::try_from(closed).unwrap_or(ids.len()),
            Err(e) => {
                tracing::warn!(
                    url = %repository.repository_url,
                    count = ids.len(),
                    error = %e,
                    "Failed to close dangling issues"
                );
                0
            }
        }
    }
}
