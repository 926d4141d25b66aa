//! Progress events emitted by the sync loops.
//!
//! The library never prints; callers subscribe with a [`ProgressCallback`]
//! (the CLI forwards every event to `tracing`).

use std::sync::Arc;

use uuid::Uuid;

use crate::entity::source_system::SourceSystem;

/// Progress events emitted during sync operations.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// The poller picked the least recently synced repository.
    SelectedRepository {
        source: SourceSystem,
        repository_id: Uuid,
        url: String,
    },

    /// Fetched a page of issues.
    FetchedPage {
        url: String,
        /// Page number (1-indexed).
        page: u32,
        count: usize,
    },

    /// A page was written to storage.
    ReconciledPage {
        url: String,
        created: usize,
        updated: usize,
        skipped: usize,
    },

    /// A remote issue failed validation and was left out of its batch.
    SkippedIssue {
        url: String,
        remote_id: i64,
        reason: String,
    },

    /// A page's batch write failed. Earlier pages stay committed.
    PageFailed { url: String, error: String },

    /// The issue walk finished and `last_parsed` was stamped.
    SyncComplete {
        url: String,
        pages: u32,
        created: usize,
        updated: usize,
    },

    /// Aggregate counts were recomputed.
    CountsUpdated {
        repository_id: Uuid,
        open_issues: i64,
        project_issues: Option<i64>,
    },

    /// The stale sweep finished.
    SweepComplete {
        repository_id: Uuid,
        examined: usize,
        closed: usize,
    },

    /// The rate gate is sleeping until the quota resets.
    QuotaWait {
        remaining: u32,
        floor: u32,
        wait_secs: u64,
    },

    /// The topic poller stored new tag sets.
    TopicsRefreshed {
        source: SourceSystem,
        repositories: usize,
        projects: usize,
    },

    /// The cache hook removed listing keys.
    CacheInvalidated { keys: u64 },

    /// Non-fatal problem worth surfacing.
    Warning { message: String },
}

/// Callback for progress updates. Shared across spawned page tasks.
pub type ProgressCallback = Arc<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}
