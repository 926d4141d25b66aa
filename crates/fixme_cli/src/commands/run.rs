//! `fixme run`, `fixme sync-once` and `fixme topics`.

use std::sync::Arc;

use clap::ValueEnum;
use sea_orm::DatabaseConnection;
use tokio::task::JoinSet;

use fixme::SourceSystem;
use fixme::cache::{CacheInvalidator, NoopInvalidator};
use fixme::classify::Classifier;
use fixme::store::DbStore;
use fixme::sync::{CycleOutcome, IssuePoller, ProgressCallback, SyncOptions, TopicPoller};
use fixme::tracker::{RateLimitedClient, TrackerClient, rate_limits};

use crate::config::Config;
use crate::progress::LoggingReporter;
use crate::shutdown;

type BoxError = Box<dyn std::error::Error>;

/// Which trackers to poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum SourceArg {
    Github,
    Gitlab,
    /// Both trackers, each with its own pollers
    #[default]
    All,
}

impl SourceArg {
    pub(crate) fn systems(self) -> Vec<SourceSystem> {
        match self {
            SourceArg::Github => vec![SourceSystem::GitHub],
            SourceArg::Gitlab => vec![SourceSystem::GitLab],
            SourceArg::All => SourceSystem::ALL.to_vec(),
        }
    }
}

/// Everything the pollers of one process share.
struct Worker {
    trackers: Vec<Arc<dyn TrackerClient>>,
    store: Arc<DbStore>,
    classifier: Arc<Classifier>,
    cache: Arc<dyn CacheInvalidator>,
    options: SyncOptions,
    on_progress: ProgressCallback,
}

impl Worker {
    /// Build clients for every selected source. A missing token for any of
    /// them fails here, before a single loop starts.
    fn build(config: &Config, db: DatabaseConnection, source: SourceArg) -> Result<Self, BoxError> {
        let trackers = source
            .systems()
            .into_iter()
            .map(|system| build_tracker(config, system))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            trackers,
            store: Arc::new(DbStore::new(db)),
            classifier: Arc::new(Classifier::builtin()),
            cache: build_cache(config)?,
            options: config.worker.sync_options(),
            on_progress: LoggingReporter::new().callback(),
        })
    }

    fn issue_poller(&self, tracker: &Arc<dyn TrackerClient>) -> IssuePoller<dyn TrackerClient, DbStore> {
        IssuePoller::new(
            Arc::clone(tracker),
            Arc::clone(&self.store),
            Arc::clone(&self.classifier),
            self.options.clone(),
        )
        .with_progress(Arc::clone(&self.on_progress))
    }

    fn topic_poller(&self, tracker: &Arc<dyn TrackerClient>) -> TopicPoller<dyn TrackerClient, DbStore> {
        TopicPoller::new(
            Arc::clone(tracker),
            Arc::clone(&self.store),
            Arc::clone(&self.classifier),
            self.options.clone(),
        )
        .with_cache(Arc::clone(&self.cache))
        .with_progress(Arc::clone(&self.on_progress))
    }
}

fn build_tracker(config: &Config, source: SourceSystem) -> Result<Arc<dyn TrackerClient>, BoxError> {
    let token = config.require_token(source)?;
    let rps = config
        .worker
        .requests_per_second
        .unwrap_or_else(|| rate_limits::default_rps(source));

    match source {
        #[cfg(feature = "github")]
        SourceSystem::GitHub => {
            let client = fixme::github::GitHubClient::new(token)?;
            let tracker: Arc<dyn TrackerClient> = Arc::new(RateLimitedClient::new(client, rps));
            Ok(tracker)
        }
        #[cfg(feature = "gitlab")]
        SourceSystem::GitLab => {
            let client = fixme::gitlab::GitLabClient::new(&config.gitlab.host, token)?;
            tracing::debug!(host = client.host(), "Using GitLab host");
            let tracker: Arc<dyn TrackerClient> = Arc::new(RateLimitedClient::new(client, rps));
            Ok(tracker)
        }
        #[allow(unreachable_patterns)]
        other => {
            let _ = (token, rps);
            Err(format!("fixme was built without {other} support").into())
        }
    }
}

fn build_cache(config: &Config) -> Result<Arc<dyn CacheInvalidator>, BoxError> {
    match config.cache.url.as_deref() {
        #[cfg(feature = "redis")]
        Some(url) => Ok(Arc::new(fixme::cache::RedisInvalidator::open(url)?)),
        #[cfg(not(feature = "redis"))]
        Some(_) => {
            tracing::warn!("Cache URL configured but fixme was built without redis support");
            Ok(Arc::new(NoopInvalidator))
        }
        None => {
            tracing::debug!("No cache configured, invalidation disabled");
            Ok(Arc::new(NoopInvalidator))
        }
    }
}

/// Run both pollers for every selected source until Ctrl+C.
pub(crate) async fn handle_run(
    source: SourceArg,
    config: &Config,
    db: DatabaseConnection,
) -> Result<(), BoxError> {
    let worker = Worker::build(config, db, source)?;
    let mut tasks = JoinSet::new();

    for tracker in &worker.trackers {
        let issues = worker.issue_poller(tracker);
        tasks.spawn(async move { issues.run_forever().await });

        let topics = worker.topic_poller(tracker);
        tasks.spawn(async move { topics.run_forever().await });

        tracing::info!(source = %tracker.source_system(), "Pollers started");
    }

    tokio::select! {
        () = shutdown::interrupted() => {}
        Some(result) = tasks.join_next() => {
            // The loops never return; only a panic lands here.
            result?;
        }
    }

    tasks.abort_all();
    Ok(())
}

/// One issue cycle per source, waiting for its sweep.
pub(crate) async fn handle_sync_once(
    source: SourceArg,
    config: &Config,
    db: DatabaseConnection,
) -> Result<(), BoxError> {
    let worker = Worker::build(config, db, source)?;

    for tracker in &worker.trackers {
        let system = tracker.source_system();
        match worker.issue_poller(tracker).run_cycle().await? {
            CycleOutcome::Idle => println!("{system}: no repositories registered"),
            CycleOutcome::Synced(mut report) => {
                let sweep = match report.sweep.take() {
                    Some(handle) => Some(handle.await?),
                    None => None,
                };
                println!(
                    "{system}: {} ({} pages, {} created, {} updated, {} skipped, {} failed pages)",
                    report.url,
                    report.pages,
                    report.outcome.created,
                    report.outcome.updated,
                    report.outcome.skipped,
                    report.failed_pages,
                );
                if let Some(open) = report.counts.open_issues {
                    println!("  open issues: {open}");
                }
                if let Some(sweep) = sweep {
                    println!(
                        "  sweep: {} examined, {} closed, {} lookups failed",
                        sweep.examined, sweep.closed, sweep.lookup_failures
                    );
                }
            }
        }
    }
    Ok(())
}

/// One topic refresh per source.
pub(crate) async fn handle_topics(
    source: SourceArg,
    config: &Config,
    db: DatabaseConnection,
) -> Result<(), BoxError> {
    let worker = Worker::build(config, db, source)?;

    for tracker in &worker.trackers {
        let report = worker.topic_poller(tracker).refresh().await?;
        println!(
            "{}: {} repositories, {} projects tagged, {} failed, {} cache keys dropped",
            tracker.source_system(),
            report.repositories,
            report.projects,
            report.failed,
            report.invalidated_keys,
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_arg_selects_systems() {
        assert_eq!(SourceArg::Github.systems(), [SourceSystem::GitHub]);
        assert_eq!(SourceArg::Gitlab.systems(), [SourceSystem::GitLab]);
        assert_eq!(SourceArg::default().systems(), SourceSystem::ALL);
    }

    #[test]
    fn missing_token_fails_before_any_client_is_built() {
        let mut config = Config::default();
        config.gitlab.token = Some("glpat-test".to_string());

        let err = build_tracker(&config, SourceSystem::GitHub).err().unwrap();
        assert!(err.to_string().contains("FIXME_GITHUB_TOKEN"));
    }

    #[cfg(feature = "gitlab")]
    #[test]
    fn gitlab_tracker_is_built_from_config() {
        let mut config = Config::default();
        config.gitlab.token = Some("glpat-test".to_string());

        let tracker = build_tracker(&config, SourceSystem::GitLab).unwrap();
        assert_eq!(tracker.source_system(), SourceSystem::GitLab);
    }

    #[test]
    fn no_cache_url_means_noop() {
        assert!(build_cache(&Config::default()).is_ok());
    }
}
