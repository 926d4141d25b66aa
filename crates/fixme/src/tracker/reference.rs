use super::errors::{Result, TrackerError};

/// A repository address split out of its web URL.
///
/// `https://github.com/owner/name` and `https://gitlab.com/group/sub/name`
/// both parse; `owner` is the second-to-last path segment, `name` the
/// last, and `path` everything after the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub host: Option<String>,
    pub owner: String,
    pub name: String,
    pub path: String,
}

impl RepoRef {
    pub fn parse(url: &str) -> Result<Self> {
        let trimmed = url.trim().trim_end_matches('/');
        let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);

        let (host, rest) = match trimmed.split_once("://") {
            Some((_, after_scheme)) => match after_scheme.split_once('/') {
                Some((host, rest)) => (Some(host), rest),
                None => (Some(after_scheme), ""),
            },
            None => match trimmed.split_once('/') {
                Some((first, rest)) if first.contains('.') => (Some(first), rest),
                _ => (None, trimmed),
            },
        };

        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() < 2 {
            return Err(TrackerError::invalid_ref(url));
        }

        let name = segments[segments.len() - 1];
        let owner = segments[segments.len() - 2];
        Ok(Self {
            host: host.map(str::to_string),
            owner: owner.to_string(),
            name: name.to_string(),
            path: segments.join("/"),
        })
    }
}
