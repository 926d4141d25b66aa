//! Tracker-agnostic client contract.
//!
//! A [`TrackerClient`] hides the paging direction and wire format of one
//! remote issue tracker behind a single "page, has more" shape. The sync
//! layer only ever talks to this trait, which is what lets tests drive the
//! whole pipeline with an in-memory tracker.
//!
//! # Example
//!
//! ```ignore
//! use fixme::tracker::{TrackerClient, PageCursor};
//!
//! async fn count_issues<C: TrackerClient>(client: &C, url: &str) -> fixme::tracker::Result<usize> {
//!     let mut cursor: Option<PageCursor> = None;
//!     let mut total = 0;
//!     loop {
//!         let page = client.fetch_issue_page(url, cursor.as_ref()).await?;
//!         total += page.issues.len();
//!         if !page.has_more {
//!             return Ok(total);
//!         }
//!         cursor = page.next_cursor;
//!     }
//! }
//! ```

mod errors;
mod pacing;
mod rate_gate;
mod reference;
mod types;

pub use errors::{Result, TrackerError, short_error_message};
pub use pacing::{ApiRateLimiter, RateLimitedClient, rate_limits};
pub use rate_gate::{
    DEFAULT_QUOTA_RETRY_ATTEMPTS, DEFAULT_QUOTA_RETRY_DELAY, DEFAULT_RATE_FLOOR,
    DEFAULT_UNMETERED_DELAY, RateGate, RateGateConfig,
};
pub use reference::RepoRef;
pub use types::{
    IssuePage, PageCursor, QuotaStatus, RawIssue, RemoteIssueState, RepoProfile, TrackerClient,
};
