//! Progress reporting for the pollers.
//!
//! Every [`SyncProgress`] event becomes a structured `tracing` record.
//! Per-page chatter is logged at debug; cycle summaries at info.

use std::sync::Arc;

use fixme::sync::{ProgressCallback, SyncProgress};

/// Logging reporter using tracing for structured output.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    /// Wrap the reporter in a callback for the pollers.
    pub fn callback(self) -> ProgressCallback {
        Arc::new(move |event| self.handle(event))
    }

    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::SelectedRepository {
                source,
                repository_id,
                url,
            } => {
                tracing::debug!(%source, %repository_id, url = %url, "Selected repository");
            }

            SyncProgress::FetchedPage { url, page, count } => {
                tracing::debug!(url = %url, page, count, "Fetched page");
            }

            SyncProgress::ReconciledPage {
                url,
                created,
                updated,
                skipped,
            } => {
                tracing::debug!(url = %url, created, updated, skipped, "Reconciled page");
            }

            SyncProgress::SkippedIssue {
                url,
                remote_id,
                reason,
            } => {
                tracing::warn!(url = %url, remote_id, reason = %reason, "Skipped malformed issue");
            }

            SyncProgress::PageFailed { url, error } => {
                tracing::error!(url = %url, error = %error, "Failed to save page");
            }

            SyncProgress::SyncComplete {
                url,
                pages,
                created,
                updated,
            } => {
                tracing::info!(url = %url, pages, created, updated, "Sync complete");
            }

            SyncProgress::CountsUpdated {
                repository_id,
                open_issues,
                project_issues,
            } => {
                tracing::debug!(%repository_id, open_issues, project_issues = ?project_issues, "Counts updated");
            }

            SyncProgress::SweepComplete {
                repository_id,
                examined,
                closed,
            } => {
                if closed > 0 {
                    tracing::info!(%repository_id, examined, closed, "Closed dangling issues");
                } else {
                    tracing::debug!(%repository_id, examined, "Sweep found nothing to close");
                }
            }

            SyncProgress::QuotaWait {
                remaining,
                floor,
                wait_secs,
            } => {
                tracing::warn!(remaining, floor, wait_secs, "Rate limit low, waiting for reset");
            }

            SyncProgress::TopicsRefreshed {
                source,
                repositories,
                projects,
            } => {
                tracing::info!(%source, repositories, projects, "Topics refreshed");
            }

            SyncProgress::CacheInvalidated { keys } => {
                tracing::info!(keys, "Cache invalidated");
            }

            SyncProgress::Warning { message } => {
                tracing::warn!(message = %message, "Warning");
            }

            other => {
                tracing::debug!(event = ?other, "Progress");
            }
        }
    }
}
