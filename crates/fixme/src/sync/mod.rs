//! Issue and topic synchronization.
//!
//! # Module Structure
//!
//! - [`types`] - `SyncOptions`, reports, `SyncError`, default cadences
//! - [`progress`] - Progress reporting: `SyncProgress`, `ProgressCallback`, `emit()`
//! - `reconcile` - page reconciliation into batched creates and updates
//! - `aggregate` - open-issue counts per repository and project
//! - `sweep` - re-verification of stale open issues
//! - `poller` - the issue polling loop tying the above together
//! - `topics` - hourly technology tag refresh
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use fixme::classify::Classifier;
//! use fixme::store::DbStore;
//! use fixme::sync::{IssuePoller, SyncOptions};
//!
//! let poller = IssuePoller::new(
//!     Arc::new(github_client),
//!     Arc::new(DbStore::new(db)),
//!     Arc::new(Classifier::builtin()),
//!     SyncOptions::default(),
//! );
//! poller.run_forever().await;
//! ```

mod aggregate;
mod locks;
mod poller;
pub mod progress;
mod reconcile;
mod sweep;
mod topics;
pub mod types;

pub use aggregate::AggregateMaintainer;
pub use locks::IssueLocks;
pub use poller::IssuePoller;
pub use progress::{ProgressCallback, SyncProgress, emit};
pub use reconcile::Reconciler;
pub use sweep::Sweeper;
pub use topics::TopicPoller;
pub use types::{
    AggregateCounts, CycleOutcome, PageOutcome, Result, SweepReport, SyncError, SyncOptions,
    SyncReport, TopicReport,
};

pub use types::{
    DEFAULT_IDLE_DELAY, DEFAULT_STALE_WINDOW, DEFAULT_TOPIC_INTERVAL, ISSUE_LOCK_SHARDS,
};
