use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use uuid::Uuid;

use crate::cache::{CacheInvalidator, ISSUE_CACHE_PATTERNS, NoopInvalidator};
use crate::classify::{BuiltinTechnologies, Classifier, TechnologyVocabulary};
use crate::store::IssueStore;
use crate::tracker::{RateGate, RepoProfile, TrackerClient, short_error_message};

use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{Result, SyncOptions, TopicReport};

/// Tags and languages gathered for one repository.
#[derive(Debug, Default)]
struct RepoTags {
    tags: BTreeSet<String>,
    /// `None` when the profile fetch failed.
    languages: Option<BTreeMap<String, f64>>,
}

/// Slow-cadence refresh of repository and project technology tags.
pub struct TopicPoller<C: ?Sized, S: ?Sized, V = BuiltinTechnologies> {
    tracker: Arc<C>,
    store: Arc<S>,
    gate: RateGate<C>,
    classifier: Arc<Classifier<V>>,
    cache: Arc<dyn CacheInvalidator>,
    options: SyncOptions,
    on_progress: Option<ProgressCallback>,
}

impl<C, S, V> TopicPoller<C, S, V>
where
    C: TrackerClient + ?Sized,
    S: IssueStore + ?Sized,
    V: TechnologyVocabulary,
{
    pub fn new(
        tracker: Arc<C>,
        store: Arc<S>,
        classifier: Arc<Classifier<V>>,
        options: SyncOptions,
    ) -> Self {
        Self {
            gate: RateGate::new(Arc::clone(&tracker), options.gate.clone()),
            tracker,
            store,
            classifier,
            cache: Arc::new(NoopInvalidator),
            options,
            on_progress: None,
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn CacheInvalidator>) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, on_progress: ProgressCallback) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    /// Refresh tags for every repository of this tracker, then roll them up
    /// to their projects and drop cached issue listings.
    ///
    /// A repository whose profile cannot be fetched keeps its stored tags
    /// and contributes them unchanged to its project.
    ///
    /// # Errors
    /// Fails only if the repository list cannot be loaded or the rate gate
    /// gives up.
    pub async fn refresh(&self) -> Result<TopicReport> {
        let source = self.tracker.source_system();
        let repositories = self.store.repositories_by_source(source).await?;
        let mut report = TopicReport::default();

        self.gate.await_capacity(self.on_progress.as_ref()).await?;

        let mut by_project: BTreeMap<Uuid, Vec<RepoTags>> = BTreeMap::new();
        for (index, repository) in repositories.iter().enumerate() {
            if index > 0 {
                self.gate.await_next_page(self.on_progress.as_ref()).await?;
            }

            let url = &repository.repository_url;
            let entry = match self.tracker.fetch_topics_and_languages(url).await {
                Ok(profile) => {
                    let tags = self.tags_for(&profile);
                    if let Err(e) = self.store.set_repository_tags(repository.id, &tags).await {
                        tracing::warn!(%url, error = %e, "Failed to store repository tags");
                    } else {
                        report.repositories += 1;
                    }
                    RepoTags {
                        tags,
                        languages: Some(profile.languages),
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        %url,
                        error = %short_error_message(&e),
                        "Failed to fetch repository profile, keeping stored tags"
                    );
                    report.failed += 1;
                    RepoTags {
                        tags: repository.tag_list().into_iter().collect(),
                        languages: None,
                    }
                }
            };
            by_project
                .entry(repository.project_id)
                .or_default()
                .push(entry);
        }

        for (project_id, entries) in &by_project {
            let tags: BTreeSet<String> = entries
                .iter()
                .flat_map(|entry| entry.tags.iter().cloned())
                .collect();
            let languages = mean_languages(entries);

            match self
                .store
                .set_project_profile(*project_id, &tags, languages.as_ref())
                .await
            {
                Ok(()) => report.projects += 1,
                Err(e) => {
                    tracing::warn!(%project_id, error = %e, "Failed to store project tags")
                }
            }
        }

        report.invalidated_keys = self.invalidate_cache().await;

        tracing::info!(
            %source,
            repositories = report.repositories,
            projects = report.projects,
            failed = report.failed,
            "Topic refresh complete"
        );
        emit(
            self.on_progress.as_ref(),
            SyncProgress::TopicsRefreshed {
                source,
                repositories: report.repositories,
                projects: report.projects,
            },
        );

        Ok(report)
    }

    /// Refresh on a fixed interval forever. The first refresh runs at once.
    pub async fn run_forever(&self) {
        let source = self.tracker.source_system();
        let mut ticker = tokio::time::interval(self.options.topic_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = self.refresh().await {
                tracing::warn!(%source, error = %e, "Topic refresh failed");
            }
        }
    }

    /// Technologies named in the description, README and each topic, plus
    /// the reported language names.
    fn tags_for(&self, profile: &RepoProfile) -> BTreeSet<String> {
        let mut tags = BTreeSet::new();
        for text in [&profile.description, &profile.readme].into_iter().flatten() {
            tags.extend(self.classifier.technologies(text));
        }
        for topic in &profile.topics {
            tags.extend(self.classifier.technologies(topic));
        }
        tags.extend(profile.languages.keys().cloned());
        tags
    }

    async fn invalidate_cache(&self) -> u64 {
        match self.cache.invalidate(&ISSUE_CACHE_PATTERNS).await {
            Ok(keys) => {
                emit(
                    self.on_progress.as_ref(),
                    SyncProgress::CacheInvalidated { keys },
                );
                keys
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cache invalidation failed");
                0
            }
        }
    }
}

/// Per-language mean over the repositories that reported a breakdown.
/// `None` when none did.
fn mean_languages(entries: &[RepoTags]) -> Option<BTreeMap<String, f64>> {
    let reported: Vec<&BTreeMap<String, f64>> = entries
        .iter()
        .filter_map(|entry| entry.languages.as_ref())
        .collect();
    if reported.is_empty() {
        return None;
    }

    let mut sums: BTreeMap<String, f64> = BTreeMap::new();
    for languages in &reported {
        for (name, share) in *languages {
            *sums.entry(name.clone()).or_default() += share;
        }
    }

    let count = reported.len() as f64;
    Some(
        sums.into_iter()
            .map(|(name, total)| (name, total / count))
            .collect(),
    )
}
