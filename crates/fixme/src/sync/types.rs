//! Options, reports and errors shared by the sync loops.

use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::store::StoreError;
use crate::tracker::{RateGateConfig, TrackerError};

/// Open issues untouched for longer than this are re-verified remotely.
pub const DEFAULT_STALE_WINDOW: Duration = Duration::from_secs(6 * 60);

/// Sleep between cycles when there is nothing to sync or a cycle failed.
pub const DEFAULT_IDLE_DELAY: Duration = Duration::from_secs(60);

/// Cadence of the topic poller.
pub const DEFAULT_TOPIC_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Number of mutex shards serializing writes per issue.
pub const ISSUE_LOCK_SHARDS: usize = 64;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A spawned page or sweep task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Tunables for the issue and topic pollers.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub stale_window: Duration,
    pub idle_delay: Duration,
    pub topic_interval: Duration,
    pub gate: RateGateConfig,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            stale_window: DEFAULT_STALE_WINDOW,
            idle_delay: DEFAULT_IDLE_DELAY,
            topic_interval: DEFAULT_TOPIC_INTERVAL,
            gate: RateGateConfig::default(),
        }
    }
}

/// Counts from reconciling one page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageOutcome {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl std::ops::AddAssign for PageOutcome {
    fn add_assign(&mut self, rhs: Self) {
        self.created += rhs.created;
        self.updated += rhs.updated;
        self.skipped += rhs.skipped;
    }
}

/// Counts written by the aggregate maintainer. `None` means the write failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateCounts {
    pub open_issues: Option<i64>,
    pub project_issues: Option<i64>,
}

/// Result of one dangling-issue sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Stale open issues looked up remotely.
    pub examined: usize,
    /// Issues marked closed.
    pub closed: usize,
    /// Lookups that failed and were treated as closed.
    pub lookup_failures: usize,
}

/// Result of a completed repository walk.
#[derive(Debug)]
#[must_use = "SyncReport carries the sweep task handle"]
pub struct SyncReport {
    pub repository_id: Uuid,
    pub project_id: Uuid,
    pub url: String,
    /// Pages fetched.
    pub pages: u32,
    /// Totals across pages whose writes succeeded.
    pub outcome: PageOutcome,
    /// Pages whose batch write failed.
    pub failed_pages: u32,
    pub counts: AggregateCounts,
    /// The sweep runs on its own task; await to observe its result.
    pub sweep: Option<JoinHandle<SweepReport>>,
}

/// What a single poller cycle did.
#[derive(Debug)]
pub enum CycleOutcome {
    /// No repository of this source exists yet.
    Idle,
    Synced(SyncReport),
}

/// Result of one topic refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopicReport {
    pub repositories: usize,
    pub projects: usize,
    /// Repositories whose profile fetch failed; their stored tags were kept.
    pub failed: usize,
    /// Cache keys removed by the invalidation hook.
    pub invalidated_keys: u64,
}
