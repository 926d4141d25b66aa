//! GitHub tracker adapter.
//!
//! Talks to the GraphQL API through `octocrab`:
//!
//! - [`client`] - [`GitHubClient`] and its [`TrackerClient`](crate::tracker::TrackerClient) impl
//! - [`types`] - query documents and response shapes
//! - [`convert`] - GraphQL nodes to tracker types
//! - [`error`] - octocrab error classification
//!
//! ```ignore
//! use fixme::github::GitHubClient;
//! use fixme::tracker::TrackerClient;
//!
//! let client = GitHubClient::new(&token)?;
//! let quota = client.check_quota().await?;
//! ```

mod client;
mod convert;
mod error;
mod types;

pub use client::{GitHubClient, create_client};
pub use error::is_rate_limit_error;
pub use types::{GitHubRateLimitResponse, GitHubRateLimits, ISSUES_PER_PAGE, RateLimitResource};
