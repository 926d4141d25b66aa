//! fixme - issue ingestion for GitHub and GitLab.
//!
//! Keeps a relational copy of the open issues of registered repositories,
//! classified by difficulty, kind and technology, so a listing service can
//! serve "good first issue" style queries without touching the trackers.
//!
//! The pieces:
//!
//! - [`tracker`] - the [`TrackerClient`](tracker::TrackerClient) contract, quota gate and pacing
//! - [`github`] / [`gitlab`] - the two adapters
//! - [`classify`] - label and text classification
//! - [`store`] - the [`IssueStore`](store::IssueStore) contract and its sea-orm implementation
//! - [`sync`] - poller, reconciler, aggregate maintainer, sweeper, topic poller
//! - [`cache`] - invalidation of cached listings after a topic refresh
//!
//! # Features
//!
//! - `sqlite`, `postgres` - database drivers
//! - `migrate` - schema migrations and [`connect_and_migrate`]
//! - `github`, `gitlab` - tracker adapters
//! - `redis` - Redis-backed [`cache::RedisInvalidator`]
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use fixme::{classify::Classifier, connect_and_migrate, store::DbStore};
//! use fixme::gitlab::GitLabClient;
//! use fixme::sync::{IssuePoller, SyncOptions};
//!
//! let db = connect_and_migrate("sqlite://fixme.db?mode=rwc").await?;
//! let poller = IssuePoller::new(
//!     Arc::new(GitLabClient::new("gitlab.com", &token)?),
//!     Arc::new(DbStore::new(db)),
//!     Arc::new(Classifier::builtin()),
//!     SyncOptions::default(),
//! );
//! let outcome = poller.run_cycle().await?;
//! ```

pub mod cache;
pub mod classify;
pub mod db;
pub mod entity;
pub mod retry;
pub mod store;
pub mod sync;
pub mod tracker;

#[cfg(feature = "github")]
pub mod github;

#[cfg(feature = "gitlab")]
pub mod gitlab;

#[cfg(feature = "migrate")]
pub mod migration;

#[cfg(test)]
pub(crate) mod testing;

pub use db::connect;
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use entity::prelude::*;
pub use store::{DbStore, IssueStore, StoreError};
pub use tracker::{TrackerClient, TrackerError};
