use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::classify::{BuiltinTechnologies, Classifier, TechnologyVocabulary};
use crate::entity::repository::Model as RepositoryModel;
use crate::store::IssueStore;
use crate::tracker::{PageCursor, RateGate, RawIssue, TrackerClient, short_error_message};

use super::aggregate::AggregateMaintainer;
use super::locks::IssueLocks;
use super::progress::{ProgressCallback, SyncProgress, emit};
use super::reconcile::Reconciler;
use super::sweep::Sweeper;
use super::types::{CycleOutcome, PageOutcome, Result, SweepReport, SyncOptions, SyncReport};

/// Continuous issue poller for one tracker.
///
/// Each cycle picks the repository synced longest ago, walks every issue
/// page, reconciles pages on spawned tasks, then recounts aggregates,
/// starts the dangling-issue sweep and stamps `last_parsed`. A cycle that
/// fails leaves `last_parsed` untouched, so the same repository is picked
/// again next time.
pub struct IssuePoller<C: ?Sized, S: ?Sized, V = BuiltinTechnologies> {
    tracker: Arc<C>,
    store: Arc<S>,
    gate: RateGate<C>,
    reconciler: Reconciler<S, V>,
    aggregates: AggregateMaintainer<S>,
    sweeper: Sweeper<C, S>,
    options: SyncOptions,
    on_progress: Option<ProgressCallback>,
}

impl<C, S, V> IssuePoller<C, S, V>
where
    C: TrackerClient + ?Sized + 'static,
    S: IssueStore + ?Sized + 'static,
    V: TechnologyVocabulary + 'static,
{
    pub fn new(
        tracker: Arc<C>,
        store: Arc<S>,
        classifier: Arc<Classifier<V>>,
        options: SyncOptions,
    ) -> Self {
        let locks = Arc::new(IssueLocks::default());
        Self {
            gate: RateGate::new(Arc::clone(&tracker), options.gate.clone()),
            reconciler: Reconciler::new(Arc::clone(&store), classifier, Arc::clone(&locks)),
            aggregates: AggregateMaintainer::new(Arc::clone(&store)),
            sweeper: Sweeper::new(
                Arc::clone(&tracker),
                Arc::clone(&store),
                locks,
                options.stale_window,
            ),
            tracker,
            store,
            options,
            on_progress: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, on_progress: ProgressCallback) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    /// Run a single select → walk → finish cycle.
    ///
    /// # Errors
    /// Tracker errors while gating or fetching abort the cycle before
    /// `last_parsed` is stamped. Page tasks already spawned keep running.
    /// Page write failures do not abort the cycle; they are counted in
    /// [`SyncReport::failed_pages`].
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let source = self.tracker.source_system();
        let Some(repository) = self.store.least_recently_parsed(source).await? else {
            tracing::debug!(%source, "No repositories to sync");
            return Ok(CycleOutcome::Idle);
        };

        let url = repository.repository_url.clone();
        tracing::info!(
            %source,
            %url,
            last_parsed = %repository.last_parsed,
            "Syncing issues"
        );
        emit(
            self.on_progress.as_ref(),
            SyncProgress::SelectedRepository {
                source,
                repository_id: repository.id,
                url: url.clone(),
            },
        );

        let mut cursor: Option<PageCursor> = None;
        let mut pages = 0u32;
        let mut tasks = Vec::new();

        loop {
            if pages == 0 {
                self.gate.await_capacity(self.on_progress.as_ref()).await?;
            } else {
                self.gate.await_next_page(self.on_progress.as_ref()).await?;
            }

            let page = self
                .tracker
                .fetch_issue_page(&url, cursor.as_ref())
                .await
                .inspect_err(|e| {
                    tracing::warn!(
                        %url,
                        page = pages + 1,
                        error = %short_error_message(e),
                        "Failed to fetch issue page, abandoning cycle"
                    );
                })?;
            pages += 1;

            tracing::debug!(%url, page = pages, count = page.issues.len(), "Fetched page");
            emit(
                self.on_progress.as_ref(),
                SyncProgress::FetchedPage {
                    url: url.clone(),
                    page: pages,
                    count: page.issues.len(),
                },
            );

            tasks.push(self.spawn_reconcile(page.issues, &repository));

            match page.next_cursor {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }

        let (outcome, failed_pages) = self.await_pages(&url, tasks).await;
        let counts = self
            .aggregates
            .recount(&repository, self.on_progress.as_ref())
            .await;
        let sweep = self.spawn_sweep(&repository);

        self.store
            .mark_parsed(repository.id, repository.project_id, Utc::now())
            .await?;

        tracing::info!(
            %url,
            pages,
            created = outcome.created,
            updated = outcome.updated,
            skipped = outcome.skipped,
            failed_pages,
            "Sync complete"
        );
        emit(
            self.on_progress.as_ref(),
            SyncProgress::SyncComplete {
                url: url.clone(),
                pages,
                created: outcome.created,
                updated: outcome.updated,
            },
        );

        Ok(CycleOutcome::Synced(SyncReport {
            repository_id: repository.id,
            project_id: repository.project_id,
            url,
            pages,
            outcome,
            failed_pages,
            counts,
            sweep: Some(sweep),
        }))
    }

    /// Cycle forever. Errors end the current cycle only.
    pub async fn run_forever(&self) {
        let source = self.tracker.source_system();
        loop {
            match self.run_cycle().await {
                Ok(CycleOutcome::Synced(_)) => {}
                Ok(CycleOutcome::Idle) => tokio::time::sleep(self.options.idle_delay).await,
                Err(e) => {
                    tracing::warn!(
                        %source,
                        error = %e,
                        retry_in_secs = self.options.idle_delay.as_secs(),
                        "Sync cycle failed"
                    );
                    tokio::time::sleep(self.options.idle_delay).await;
                }
            }
        }
    }

    fn spawn_reconcile(
        &self,
        issues: Vec<RawIssue>,
        repository: &RepositoryModel,
    ) -> JoinHandle<Result<PageOutcome>> {
        let reconciler = self.reconciler.clone();
        let repository = repository.clone();
        let on_progress = self.on_progress.clone();
        tokio::spawn(async move {
            reconciler
                .reconcile_page(&issues, &repository, on_progress.as_ref())
                .await
        })
    }

    fn spawn_sweep(&self, repository: &RepositoryModel) -> JoinHandle<SweepReport> {
        let sweeper = self.sweeper.clone();
        let repository = repository.clone();
        let on_progress = self.on_progress.clone();
        tokio::spawn(async move { sweeper.sweep(&repository, on_progress.as_ref()).await })
    }

    /// Wait for every page task so counts never run ahead of the writes.
    async fn await_pages(
        &self,
        url: &str,
        tasks: Vec<JoinHandle<Result<PageOutcome>>>,
    ) -> (PageOutcome, u32) {
        let mut total = PageOutcome::default();
        let mut failed = 0u32;

        for task in tasks {
            let error = match task.await {
                Ok(Ok(outcome)) => {
                    total += outcome;
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(join_err) => join_err.to_string(),
            };
            failed += 1;
            tracing::warn!(%url, %error, "Failed to persist issue page");
            emit(
                self.on_progress.as_ref(),
                SyncProgress::PageFailed {
                    url: url.to_string(),
                    error,
                },
            );
        }

        (total, failed)
    }
}
