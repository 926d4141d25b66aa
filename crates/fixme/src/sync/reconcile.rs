use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::classify::{BuiltinTechnologies, Classifier, TechnologyVocabulary};
use crate::entity::issue::Model as IssueModel;
use crate::entity::repository::Model as RepositoryModel;
use crate::store::IssueStore;
use crate::tracker::RawIssue;

use super::locks::IssueLocks;
use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{PageOutcome, Result};

/// Turns pages of remote issues into batched creates and updates.
pub struct Reconciler<S: ?Sized, V = BuiltinTechnologies> {
    store: Arc<S>,
    classifier: Arc<Classifier<V>>,
    locks: Arc<IssueLocks>,
}

impl<S: ?Sized, V> Clone for Reconciler<S, V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            classifier: Arc::clone(&self.classifier),
            locks: Arc::clone(&self.locks),
        }
    }
}

/// Why a remote issue was left out of its batch.
fn missing_field(raw: &RawIssue) -> Option<&'static str> {
    if raw.remote_id == 0 {
        Some("missing remote id")
    } else if raw.number == 0 {
        Some("missing issue number")
    } else if raw.url.trim().is_empty() {
        Some("missing url")
    } else {
        None
    }
}

impl<S, V> Reconciler<S, V>
where
    S: IssueStore + ?Sized,
    V: TechnologyVocabulary,
{
    pub fn new(store: Arc<S>, classifier: Arc<Classifier<V>>, locks: Arc<IssueLocks>) -> Self {
        Self {
            store,
            classifier,
            locks,
        }
    }

    /// Reconcile one page of remote issues against storage.
    ///
    /// Issues already stored under the same `(source_system, remote_id)` keep
    /// their primary key and creation time; everything else is created.
    /// Invalid records are skipped and reported. At most two batch writes
    /// are issued per page.
    ///
    /// # Errors
    /// Returns the first storage error. Writes from earlier pages, and the
    /// create batch of this page if the update batch fails, stay committed.
    pub async fn reconcile_page(
        &self,
        issues: &[RawIssue],
        repository: &RepositoryModel,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<PageOutcome> {
        let mut outcome = PageOutcome::default();

        // Later duplicates in a page win; one batch must not touch a row twice.
        let mut valid: Vec<&RawIssue> = Vec::with_capacity(issues.len());
        let mut position: HashMap<i64, usize> = HashMap::new();
        for raw in issues {
            if let Some(reason) = missing_field(raw) {
                tracing::warn!(
                    url = %repository.repository_url,
                    remote_id = raw.remote_id,
                    reason,
                    "Skipping invalid remote issue"
                );
                emit(
                    on_progress,
                    SyncProgress::SkippedIssue {
                        url: repository.repository_url.clone(),
                        remote_id: raw.remote_id,
                        reason: reason.to_string(),
                    },
                );
                outcome.skipped += 1;
                continue;
            }
            match position.get(&raw.remote_id) {
                Some(&index) => valid[index] = raw,
                None => {
                    position.insert(raw.remote_id, valid.len());
                    valid.push(raw);
                }
            }
        }

        if valid.is_empty() {
            return Ok(outcome);
        }

        let remote_ids: Vec<i64> = valid.iter().map(|raw| raw.remote_id).collect();
        let _guards = self.locks.lock_many(remote_ids.iter().copied()).await;

        let existing: HashMap<i64, IssueModel> = self
            .store
            .find_issues(repository.source_system, &remote_ids)
            .await?
            .into_iter()
            .map(|issue| (issue.remote_id, issue))
            .collect();

        let technologies = repository.tags.clone();
        let mut creates = Vec::new();
        let mut updates = Vec::new();

        for raw in valid {
            let candidate = self.candidate(raw, repository, &technologies);
            match existing.get(&raw.remote_id) {
                Some(stored) => updates.push(IssueModel {
                    id: stored.id,
                    created_at: stored.created_at,
                    // Closure is terminal.
                    closed: stored.closed || candidate.closed,
                    ..candidate
                }),
                None => creates.push(candidate),
            }
        }

        outcome.created = creates.len();
        outcome.updated = updates.len();

        self.store.create_issues(creates).await?;
        self.store.update_issues(updates).await?;

        tracing::debug!(
            url = %repository.repository_url,
            created = outcome.created,
            updated = outcome.updated,
            skipped = outcome.skipped,
            "Reconciled page"
        );
        emit(
            on_progress,
            SyncProgress::ReconciledPage {
                url: repository.repository_url.clone(),
                created: outcome.created,
                updated: outcome.updated,
                skipped: outcome.skipped,
            },
        );

        Ok(outcome)
    }

    fn candidate(
        &self,
        raw: &RawIssue,
        repository: &RepositoryModel,
        technologies: &serde_json::Value,
    ) -> IssueModel {
        let now = Utc::now().fixed_offset();
        IssueModel {
            id: Uuid::new_v4(),
            source_system: repository.source_system,
            remote_id: raw.remote_id,
            number: raw.number,
            title: raw.title.clone(),
            body: raw.body.clone(),
            url: raw.url.clone(),
            closed: raw.closed,
            experience_needed: self.classifier.difficulty(&raw.labels),
            issue_type: self.classifier.issue_type(&raw.labels),
            labels: serde_json::json!(raw.labels),
            technologies: technologies.clone(),
            project_id: repository.project_id,
            repository_id: repository.id,
            remote_created_at: raw.created_at.map(|at| at.fixed_offset()),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::entity::experience_tier::ExperienceTier;
    use crate::entity::issue_type::IssueType;
    use crate::entity::source_system::SourceSystem;
    use crate::sync::SyncError;
    use crate::testing::{MemoryStore, raw_issue};

    fn reconciler(store: &Arc<MemoryStore>) -> Reconciler<MemoryStore> {
        Reconciler::new(
            Arc::clone(store),
            Arc::new(Classifier::builtin()),
            Arc::new(IssueLocks::default()),
        )
    }

    fn setup() -> (Arc<MemoryStore>, RepositoryModel) {
        let store = Arc::new(MemoryStore::default());
        let project = store.add_project(SourceSystem::GitHub);
        let repo = store.add_repository(project, SourceSystem::GitHub, "https://github.com/o/r");
        (store, repo)
    }

    #[tokio::test]
    async fn new_issues_are_created() {
        let (store, repo) = setup();
        let page = vec![raw_issue(101, 1), raw_issue(102, 2)];

        let outcome = reconciler(&store)
            .reconcile_page(&page, &repo, None)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            PageOutcome {
                created: 2,
                updated: 0,
                skipped: 0
            }
        );
        assert_eq!(store.issue_count(), 2);
    }

    #[tokio::test]
    async fn reconciling_same_page_twice_is_idempotent() {
        let (store, repo) = setup();
        let page = vec![raw_issue(101, 1), raw_issue(102, 2), raw_issue(103, 3)];
        let reconciler = reconciler(&store);

        reconciler.reconcile_page(&page, &repo, None).await.unwrap();
        let after_first = store.issue_count();
        let second = reconciler.reconcile_page(&page, &repo, None).await.unwrap();

        assert_eq!(store.issue_count(), after_first);
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 3);
    }

    #[tokio::test]
    async fn existing_issue_keeps_primary_identity() {
        let (store, repo) = setup();
        let reconciler = reconciler(&store);

        reconciler
            .reconcile_page(&[raw_issue(101, 1)], &repo, None)
            .await
            .unwrap();
        let original = store.issue_by_remote_id(101).unwrap();

        let mut changed = raw_issue(101, 1);
        changed.title = Some("Renamed upstream".to_string());
        changed.labels = vec!["good first issue".to_string(), "bug".to_string()];
        reconciler
            .reconcile_page(&[changed], &repo, None)
            .await
            .unwrap();

        let updated = store.issue_by_remote_id(101).unwrap();
        assert_eq!(updated.id, original.id);
        assert_eq!(updated.created_at, original.created_at);
        assert_eq!(updated.title.as_deref(), Some("Renamed upstream"));
        assert_eq!(updated.experience_needed, ExperienceTier::Easy);
        assert_eq!(updated.issue_type, Some(IssueType::Bugfix));
        assert!(updated.updated_at >= original.updated_at);
    }

    #[tokio::test]
    async fn invalid_issues_are_skipped_not_fatal() {
        let (store, repo) = setup();
        let no_id = raw_issue(0, 5);
        let mut no_url = raw_issue(104, 4);
        no_url.url = "  ".to_string();
        let page = vec![no_id, raw_issue(101, 1), no_url];

        let skipped = Arc::new(Mutex::new(Vec::new()));
        let capture = Arc::clone(&skipped);
        let callback: ProgressCallback = Arc::new(move |event| {
            if let SyncProgress::SkippedIssue { reason, .. } = event {
                capture.lock().unwrap().push(reason);
            }
        });

        let outcome = reconciler(&store)
            .reconcile_page(&page, &repo, Some(&callback))
            .await
            .unwrap();

        assert_eq!(outcome.created, 1);
        assert_eq!(outcome.skipped, 2);
        assert_eq!(
            *skipped.lock().unwrap(),
            vec!["missing remote id".to_string(), "missing url".to_string()]
        );
    }

    #[tokio::test]
    async fn duplicate_remote_ids_in_a_page_collapse() {
        let (store, repo) = setup();
        let mut newer = raw_issue(101, 1);
        newer.title = Some("second copy".to_string());

        let outcome = reconciler(&store)
            .reconcile_page(&[raw_issue(101, 1), newer], &repo, None)
            .await
            .unwrap();

        assert_eq!(outcome.created, 1);
        assert_eq!(store.issue_count(), 1);
        assert_eq!(
            store.issue_by_remote_id(101).unwrap().title.as_deref(),
            Some("second copy")
        );
    }

    #[tokio::test]
    async fn closed_issue_stays_closed() {
        let (store, repo) = setup();
        let reconciler = reconciler(&store);
        let mut closed = raw_issue(101, 1);
        closed.closed = true;

        reconciler.reconcile_page(&[closed], &repo, None).await.unwrap();
        reconciler
            .reconcile_page(&[raw_issue(101, 1)], &repo, None)
            .await
            .unwrap();

        assert!(store.issue_by_remote_id(101).unwrap().closed);
    }

    #[tokio::test]
    async fn issues_inherit_repository_tags() {
        let store = Arc::new(MemoryStore::default());
        let project = store.add_project(SourceSystem::GitLab);
        let mut repo =
            store.add_repository(project, SourceSystem::GitLab, "https://gitlab.com/g/p");
        repo.tags = json!(["Rails", "Ruby"]);

        reconciler(&store)
            .reconcile_page(&[raw_issue(9, 1)], &repo, None)
            .await
            .unwrap();

        let issue = store.issue_by_remote_id(9).unwrap();
        assert_eq!(issue.technologies, json!(["Rails", "Ruby"]));
        assert_eq!(issue.source_system, SourceSystem::GitLab);
        assert_eq!(issue.repository_id, repo.id);
        assert_eq!(issue.project_id, repo.project_id);
    }

    #[tokio::test]
    async fn same_remote_id_on_other_source_is_distinct() {
        let store = Arc::new(MemoryStore::default());
        let gh_project = store.add_project(SourceSystem::GitHub);
        let gh = store.add_repository(gh_project, SourceSystem::GitHub, "https://github.com/o/r");
        let gl_project = store.add_project(SourceSystem::GitLab);
        let gl = store.add_repository(gl_project, SourceSystem::GitLab, "https://gitlab.com/g/p");
        let reconciler = reconciler(&store);

        reconciler
            .reconcile_page(&[raw_issue(7, 1)], &gh, None)
            .await
            .unwrap();
        let outcome = reconciler
            .reconcile_page(&[raw_issue(7, 1)], &gl, None)
            .await
            .unwrap();

        assert_eq!(outcome.created, 1);
        assert_eq!(store.issue_count(), 2);
    }

    #[tokio::test]
    async fn storage_failure_is_returned() {
        let (store, repo) = setup();
        store.fail_writes(true);

        let err = reconciler(&store)
            .reconcile_page(&[raw_issue(101, 1)], &repo, None)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Store(_)));
        assert_eq!(store.issue_count(), 0);
    }
}
