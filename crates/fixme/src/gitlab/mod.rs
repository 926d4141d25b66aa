//! GitLab tracker adapter over the REST v4 API.
//!
//! Projects are addressed by their URL-encoded full path, so subgroup
//! repositories (`group/sub/name`) work without a project-id lookup.

mod client;
mod convert;
mod types;

pub use client::{DEFAULT_HOST, GitLabClient};
pub use types::{GitLabIssue, GitLabProject, ISSUES_PER_PAGE};
