//! Mapping of octocrab failures onto [`TrackerError`].

use chrono::Utc;

use crate::tracker::TrackerError;

/// Check if an error indicates a rate limit (403/429 from GitHub).
pub fn is_rate_limit_error(e: &octocrab::Error) -> bool {
    match e {
        octocrab::Error::GitHub { source, .. } => {
            let status = source.status_code.as_u16();
            status == 429 || (status == 403 && source.message.to_lowercase().contains("rate limit"))
        }
        _ => false,
    }
}

impl From<octocrab::Error> for TrackerError {
    fn from(err: octocrab::Error) -> Self {
        if is_rate_limit_error(&err) {
            return TrackerError::RateLimited {
                reset_at: Utc::now() + chrono::Duration::minutes(1),
            };
        }
        match err {
            octocrab::Error::GitHub { source, .. } => {
                match reqwest::StatusCode::from_u16(source.status_code.as_u16()) {
                    Ok(status) => TrackerError::from_status(status, &source.message),
                    Err(_) => TrackerError::api(source.message),
                }
            }
            octocrab::Error::Json { .. } | octocrab::Error::Serde { .. } => {
                TrackerError::decode(err.to_string())
            }
            other => TrackerError::network(other.to_string()),
        }
    }
}
