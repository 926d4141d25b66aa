//! Configuration file support for fixme.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. `FIXME_`-prefixed environment variables (`FIXME_GITHUB_TOKEN`,
//!    `FIXME_WORKER__RATE_FLOOR`)
//! 2. Legacy environment variables (`GITHUB_TOKEN`, `GITLAB_TOKEN`,
//!    `DATABASE_URL`, `CACHE_SERVER`)
//! 3. Config file (`./fixme.toml`, then ~/.config/fixme/config.toml)
//! 4. Built-in defaults
//!
//! The database URL defaults to `sqlite://~/.local/state/fixme/fixme.db` on Linux
//! (using the XDG state directory) if not explicitly configured.
//!
//! Example config file:
//! ```toml
//! [database]
//! url = "postgres://localhost/fixme"
//!
//! [github]
//! token = "ghp_..."
//!
//! [gitlab]
//! host = "gitlab.com"
//! token = "glpat-..."
//!
//! [cache]
//! url = "redis://127.0.0.1:6379"
//!
//! [worker]
//! topic_interval_secs = 3600
//! rate_floor = 100
//! stale_window_secs = 360
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use fixme::SourceSystem;
use fixme::sync::{DEFAULT_IDLE_DELAY, DEFAULT_STALE_WINDOW, DEFAULT_TOPIC_INTERVAL, SyncOptions};
use fixme::tracker::{
    DEFAULT_QUOTA_RETRY_ATTEMPTS, DEFAULT_QUOTA_RETRY_DELAY, DEFAULT_RATE_FLOOR,
    DEFAULT_UNMETERED_DELAY, RateGateConfig,
};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("No {tracker} token configured. Set {env} or [{section}] token in fixme.toml")]
    MissingToken {
        tracker: SourceSystem,
        env: &'static str,
        section: &'static str,
    },

    #[error("No database URL configured and no state directory available. Set FIXME_DATABASE_URL")]
    NoDatabase,
}

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub github: GitHubConfig,
    pub gitlab: GitLabConfig,
    /// Listing cache invalidated after topic refreshes.
    pub cache: CacheConfig,
    pub worker: WorkerConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Defaults to a SQLite file under the XDG state directory.
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GitLabConfig {
    pub host: String,
    pub token: Option<String>,
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            host: "gitlab.com".to_string(),
            token: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Redis URL. Without one, invalidation is a no-op.
    pub url: Option<String>,
}

/// Poller tunables.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub topic_interval_secs: u64,
    /// Remaining quota below which the GitHub poller waits for the reset.
    pub rate_floor: u32,
    /// Open issues not seen for this long are re-verified.
    pub stale_window_secs: u64,
    pub quota_retry_secs: u64,
    pub quota_retry_attempts: usize,
    /// Pause between GitLab page fetches.
    pub gitlab_delay_secs: u64,
    pub idle_delay_secs: u64,
    /// Request pacing; defaults per tracker when unset.
    pub requests_per_second: Option<u32>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            topic_interval_secs: DEFAULT_TOPIC_INTERVAL.as_secs(),
            rate_floor: DEFAULT_RATE_FLOOR,
            stale_window_secs: DEFAULT_STALE_WINDOW.as_secs(),
            quota_retry_secs: DEFAULT_QUOTA_RETRY_DELAY.as_secs(),
            quota_retry_attempts: DEFAULT_QUOTA_RETRY_ATTEMPTS,
            gitlab_delay_secs: DEFAULT_UNMETERED_DELAY.as_secs(),
            idle_delay_secs: DEFAULT_IDLE_DELAY.as_secs(),
            requests_per_second: None,
        }
    }
}

impl WorkerConfig {
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            stale_window: Duration::from_secs(self.stale_window_secs),
            idle_delay: Duration::from_secs(self.idle_delay_secs),
            topic_interval: Duration::from_secs(self.topic_interval_secs),
            gate: RateGateConfig {
                floor: self.rate_floor,
                quota_retry_delay: Duration::from_secs(self.quota_retry_secs),
                quota_retry_attempts: self.quota_retry_attempts,
                unmetered_delay: Duration::from_secs(self.gitlab_delay_secs),
            },
        }
    }
}

/// Environment overrides for the flat keys, most specific first.
const ENV_OVERRIDES: [(&[&str], Key); 5] = [
    (&["FIXME_DATABASE_URL", "DATABASE_URL"], Key::DatabaseUrl),
    (&["FIXME_GITHUB_TOKEN", "GITHUB_TOKEN"], Key::GitHubToken),
    (&["FIXME_GITLAB_TOKEN", "GITLAB_TOKEN"], Key::GitLabToken),
    (&["FIXME_GITLAB_HOST"], Key::GitLabHost),
    (&["FIXME_CACHE_URL", "CACHE_SERVER"], Key::CacheUrl),
];

#[derive(Debug, Clone, Copy)]
enum Key {
    DatabaseUrl,
    GitHubToken,
    GitLabToken,
    GitLabHost,
    CacheUrl,
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// # Errors
    /// A config file that exists but does not parse is an error.
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(xdg_config) = Self::default_config_path()
            && xdg_config.exists()
        {
            tracing::debug!("Loading config from {:?}", xdg_config);
            builder = builder.add_source(
                File::from(xdg_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let local_config = PathBuf::from("fixme.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./fixme.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // FIXME_WORKER__RATE_FLOOR -> worker.rate_floor
        builder = builder.add_source(
            Environment::with_prefix("FIXME")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: Config = builder.build()?.try_deserialize()?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Apply the flat `FIXME_*` and legacy variables. Empty values are ignored.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for (names, key) in ENV_OVERRIDES {
            let Some(value) = names
                .iter()
                .find_map(|name| lookup(*name).filter(|v| !v.trim().is_empty()))
            else {
                continue;
            };
            match key {
                Key::DatabaseUrl => self.database.url = Some(value),
                Key::GitHubToken => self.github.token = Some(value),
                Key::GitLabToken => self.gitlab.token = Some(value),
                Key::GitLabHost => self.gitlab.host = value,
                Key::CacheUrl => self.cache.url = Some(value),
            }
        }
    }

    /// Get the database URL, falling back to the default state directory path.
    ///
    /// The `mode=rwc` parameter creates the SQLite file if it doesn't exist.
    pub fn database_url(&self) -> Result<String, ConfigError> {
        if let Some(url) = &self.database.url {
            return Ok(url.clone());
        }
        Self::default_state_dir()
            .map(|state_dir| {
                let db_path = state_dir.join("fixme.db");
                format!("sqlite://{}?mode=rwc", db_path.display())
            })
            .ok_or(ConfigError::NoDatabase)
    }

    /// The token for `source`.
    ///
    /// # Errors
    /// [`ConfigError::MissingToken`] when none is configured.
    pub fn require_token(&self, source: SourceSystem) -> Result<&str, ConfigError> {
        let (token, env, section) = match source {
            SourceSystem::GitHub => (&self.github.token, "FIXME_GITHUB_TOKEN", "github"),
            SourceSystem::GitLab => (&self.gitlab.token, "FIXME_GITLAB_TOKEN", "gitlab"),
        };
        token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken {
                tracker: source,
                env,
                section,
            })
    }

    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "fixme").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the default state directory path.
    ///
    /// On Linux, this is `$XDG_STATE_HOME/fixme` or `~/.local/state/fixme`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "fixme").map(|dirs| {
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }
}
