//! In-memory tracker, store and cache used by unit tests.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sea_orm::DbErr;
use serde_json::json;
use uuid::Uuid;

use crate::cache::{CacheError, CacheInvalidator};
use crate::entity::experience_tier::ExperienceTier;
use crate::entity::issue::Model as IssueModel;
use crate::entity::project::Model as ProjectModel;
use crate::entity::repository::Model as RepositoryModel;
use crate::entity::source_system::SourceSystem;
use crate::store::{IssueStore, StoreError};
use crate::tracker::{
    IssuePage, PageCursor, QuotaStatus, RawIssue, RemoteIssueState, RepoProfile, TrackerClient,
    TrackerError,
};

/// An open, unlabeled remote issue.
pub(crate) fn raw_issue(remote_id: i64, number: i64) -> RawIssue {
    RawIssue {
        remote_id,
        number,
        title: Some(format!("Issue {number}")),
        body: Some("Steps to reproduce".to_string()),
        url: format!("https://tracker.test/issues/{number}"),
        closed: false,
        labels: Vec::new(),
        created_at: Some(Utc::now()),
    }
}

fn epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(0, 0).single().unwrap_or_default()
}

// ─── Tracker ─────────────────────────────────────────────────────────────────

/// Scripted [`TrackerClient`].
///
/// Issue pages are addressed by 1-based page number regardless of source.
/// Unscripted quota checks report 5000 remaining for GitHub and unmetered
/// for GitLab.
pub(crate) struct FakeTracker {
    source: SourceSystem,
    pages: Mutex<HashMap<String, Vec<Vec<RawIssue>>>>,
    failing_pages: Mutex<HashSet<(String, u32)>>,
    states: Mutex<HashMap<(String, i64), RemoteIssueState>>,
    failing_states: Mutex<HashSet<(String, i64)>>,
    profiles: Mutex<HashMap<String, RepoProfile>>,
    quota: Mutex<VecDeque<Result<QuotaStatus, TrackerError>>>,
    page_calls: AtomicUsize,
    state_calls: AtomicUsize,
    quota_calls: AtomicUsize,
}

impl FakeTracker {
    fn new(source: SourceSystem) -> Self {
        Self {
            source,
            pages: Mutex::default(),
            failing_pages: Mutex::default(),
            states: Mutex::default(),
            failing_states: Mutex::default(),
            profiles: Mutex::default(),
            quota: Mutex::default(),
            page_calls: AtomicUsize::new(0),
            state_calls: AtomicUsize::new(0),
            quota_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn github() -> Self {
        Self::new(SourceSystem::GitHub)
    }

    pub(crate) fn gitlab() -> Self {
        Self::new(SourceSystem::GitLab)
    }

    pub(crate) fn set_pages(&self, url: &str, pages: Vec<Vec<RawIssue>>) {
        self.pages.lock().unwrap().insert(url.to_string(), pages);
    }

    pub(crate) fn fail_page(&self, url: &str, page: u32) {
        self.failing_pages
            .lock()
            .unwrap()
            .insert((url.to_string(), page));
    }

    pub(crate) fn clear_failures(&self) {
        self.failing_pages.lock().unwrap().clear();
        self.failing_states.lock().unwrap().clear();
    }

    pub(crate) fn set_state(&self, url: &str, number: i64, state: RemoteIssueState) {
        self.states
            .lock()
            .unwrap()
            .insert((url.to_string(), number), state);
    }

    pub(crate) fn fail_state(&self, url: &str, number: i64) {
        self.failing_states
            .lock()
            .unwrap()
            .insert((url.to_string(), number));
    }

    pub(crate) fn set_profile(&self, url: &str, profile: RepoProfile) {
        self.profiles
            .lock()
            .unwrap()
            .insert(url.to_string(), profile);
    }

    pub(crate) fn push_quota(&self, status: Result<QuotaStatus, TrackerError>) {
        self.quota.lock().unwrap().push_back(status);
    }

    pub(crate) fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn state_calls(&self) -> usize {
        self.state_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn quota_calls(&self) -> usize {
        self.quota_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrackerClient for FakeTracker {
    fn source_system(&self) -> SourceSystem {
        self.source
    }

    async fn fetch_issue_page(
        &self,
        repository_url: &str,
        cursor: Option<&PageCursor>,
    ) -> Result<IssuePage, TrackerError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        let page_no = match cursor {
            None => 1,
            Some(PageCursor::Page(n)) => *n,
            Some(PageCursor::Before(s)) => s.parse().unwrap_or(1),
        };

        if self
            .failing_pages
            .lock()
            .unwrap()
            .contains(&(repository_url.to_string(), page_no))
        {
            return Err(TrackerError::api(format!("502 Bad Gateway on page {page_no}")));
        }

        let pages = self.pages.lock().unwrap();
        let Some(pages) = pages.get(repository_url) else {
            return Ok(IssuePage::last(Vec::new()));
        };
        let index = page_no as usize - 1;
        let issues = pages.get(index).cloned().unwrap_or_default();
        if index + 1 < pages.len() {
            Ok(IssuePage::with_next(issues, PageCursor::Page(page_no + 1)))
        } else {
            Ok(IssuePage::last(issues))
        }
    }

    async fn fetch_issue_state(
        &self,
        repository_url: &str,
        number: i64,
    ) -> Result<RemoteIssueState, TrackerError> {
        self.state_calls.fetch_add(1, Ordering::SeqCst);
        let key = (repository_url.to_string(), number);
        if self.failing_states.lock().unwrap().contains(&key) {
            return Err(TrackerError::network("connection reset by peer"));
        }
        self.states
            .lock()
            .unwrap()
            .get(&key)
            .copied()
            .ok_or_else(|| TrackerError::not_found(format!("issue {number}")))
    }

    async fn fetch_topics_and_languages(
        &self,
        repository_url: &str,
    ) -> Result<RepoProfile, TrackerError> {
        self.profiles
            .lock()
            .unwrap()
            .get(repository_url)
            .cloned()
            .ok_or_else(|| TrackerError::not_found(repository_url.to_string()))
    }

    async fn check_quota(&self) -> Result<QuotaStatus, TrackerError> {
        self.quota_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(scripted) = self.quota.lock().unwrap().pop_front() {
            return scripted;
        }
        Ok(match self.source {
            SourceSystem::GitHub => QuotaStatus::Metered {
                remaining: 5000,
                reset_at: Utc::now() + chrono::Duration::hours(1),
            },
            SourceSystem::GitLab => QuotaStatus::Unmetered,
        })
    }
}

// ─── Store ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Tables {
    projects: Vec<ProjectModel>,
    repositories: Vec<RepositoryModel>,
    issues: Vec<IssueModel>,
}

/// [`IssueStore`] over plain vectors with failure injection.
#[derive(Default)]
pub(crate) struct MemoryStore {
    tables: Mutex<Tables>,
    fail_writes: AtomicBool,
    fail_repository_counts: AtomicBool,
    touch_on_find: Mutex<HashSet<i64>>,
    close_calls: AtomicUsize,
}

fn injected() -> StoreError {
    StoreError::Database(DbErr::Custom("injected failure".to_string()))
}

impl MemoryStore {
    pub(crate) fn add_project(&self, source: SourceSystem) -> Uuid {
        let now = Utc::now().fixed_offset();
        let id = Uuid::new_v4();
        self.tables.lock().unwrap().projects.push(ProjectModel {
            id,
            display_name: format!("project-{id}"),
            description: None,
            link: "https://example.org".to_string(),
            source_system: source,
            issues_count: 0,
            tags: json!([]),
            languages: json!({}),
            last_parsed: None,
            created_at: now,
            updated_at: now,
        });
        id
    }

    pub(crate) fn add_repository(
        &self,
        project_id: Uuid,
        source: SourceSystem,
        url: &str,
    ) -> RepositoryModel {
        let now = Utc::now().fixed_offset();
        let repository = RepositoryModel {
            id: Uuid::new_v4(),
            project_id,
            source_system: source,
            repository_url: url.to_string(),
            issue_count: 0,
            tags: json!([]),
            last_parsed: epoch().fixed_offset(),
            created_at: now,
            updated_at: now,
        };
        self.tables
            .lock()
            .unwrap()
            .repositories
            .push(repository.clone());
        repository
    }

    /// Store issues directly, bypassing classification.
    pub(crate) fn insert_issues(
        &self,
        repository: &RepositoryModel,
        issues: impl IntoIterator<Item = RawIssue>,
    ) {
        let now = Utc::now().fixed_offset();
        let mut tables = self.tables.lock().unwrap();
        for raw in issues {
            tables.issues.push(IssueModel {
                id: Uuid::new_v4(),
                source_system: repository.source_system,
                remote_id: raw.remote_id,
                number: raw.number,
                title: raw.title,
                body: raw.body,
                url: raw.url,
                closed: raw.closed,
                experience_needed: ExperienceTier::Moderate,
                issue_type: None,
                labels: json!(raw.labels),
                technologies: repository.tags.clone(),
                project_id: repository.project_id,
                repository_id: repository.id,
                remote_created_at: None,
                created_at: now,
                updated_at: now,
            });
        }
    }

    /// Push an issue's `updated_at` into the past.
    pub(crate) fn age_issue(&self, remote_id: i64, by: chrono::Duration) {
        let mut tables = self.tables.lock().unwrap();
        for issue in tables.issues.iter_mut().filter(|i| i.remote_id == remote_id) {
            issue.updated_at = (Utc::now() - by).fixed_offset();
        }
    }

    /// Stamp `updated_at = now` on the issue the next time it is looked up.
    pub(crate) fn touch_on_next_find(&self, remote_id: i64) {
        self.touch_on_find.lock().unwrap().insert(remote_id);
    }

    pub(crate) fn set_last_parsed(&self, repository_id: Uuid, at: DateTime<Utc>) {
        let mut tables = self.tables.lock().unwrap();
        if let Some(repo) = tables
            .repositories
            .iter_mut()
            .find(|r| r.id == repository_id)
        {
            repo.last_parsed = at.fixed_offset();
        }
    }

    pub(crate) fn set_repository_tag_list(&self, repository_id: Uuid, tags: &[&str]) {
        let mut tables = self.tables.lock().unwrap();
        if let Some(repo) = tables
            .repositories
            .iter_mut()
            .find(|r| r.id == repository_id)
        {
            repo.tags = json!(tags);
        }
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_repository_count_writes(&self, fail: bool) {
        self.fail_repository_counts.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn issue_count(&self) -> usize {
        self.tables.lock().unwrap().issues.len()
    }

    pub(crate) fn issue_by_remote_id(&self, remote_id: i64) -> Option<IssueModel> {
        self.tables
            .lock()
            .unwrap()
            .issues
            .iter()
            .find(|i| i.remote_id == remote_id)
            .cloned()
    }

    pub(crate) fn repository(&self, id: Uuid) -> Option<RepositoryModel> {
        self.tables
            .lock()
            .unwrap()
            .repositories
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    pub(crate) fn project(&self, id: Uuid) -> Option<ProjectModel> {
        self.tables
            .lock()
            .unwrap()
            .projects
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    fn check_writes(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected());
        }
        Ok(())
    }
}

#[async_trait]
impl IssueStore for MemoryStore {
    async fn least_recently_parsed(
        &self,
        source: SourceSystem,
    ) -> Result<Option<RepositoryModel>, StoreError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .repositories
            .iter()
            .filter(|r| r.source_system == source)
            .min_by_key(|r| r.last_parsed)
            .cloned())
    }

    async fn repositories_by_source(
        &self,
        source: SourceSystem,
    ) -> Result<Vec<RepositoryModel>, StoreError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .repositories
            .iter()
            .filter(|r| r.source_system == source)
            .cloned()
            .collect())
    }

    async fn repositories_for_project(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<RepositoryModel>, StoreError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .repositories
            .iter()
            .filter(|r| r.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn find_issues(
        &self,
        source: SourceSystem,
        remote_ids: &[i64],
    ) -> Result<Vec<IssueModel>, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let mut touch = self.touch_on_find.lock().unwrap();
        let now = Utc::now().fixed_offset();
        Ok(tables
            .issues
            .iter_mut()
            .filter(|i| i.source_system == source && remote_ids.contains(&i.remote_id))
            .map(|issue| {
                if touch.remove(&issue.remote_id) {
                    issue.updated_at = now;
                }
                issue.clone()
            })
            .collect())
    }

    async fn create_issues(&self, batch: Vec<IssueModel>) -> Result<u64, StoreError> {
        self.check_writes()?;
        let mut tables = self.tables.lock().unwrap();
        let count = batch.len() as u64;
        for issue in batch {
            match tables.issues.iter_mut().find(|i| {
                i.source_system == issue.source_system && i.remote_id == issue.remote_id
            }) {
                Some(existing) => {
                    *existing = IssueModel {
                        id: existing.id,
                        created_at: existing.created_at,
                        ..issue
                    }
                }
                None => tables.issues.push(issue),
            }
        }
        Ok(count)
    }

    async fn update_issues(&self, batch: Vec<IssueModel>) -> Result<u64, StoreError> {
        self.check_writes()?;
        let mut tables = self.tables.lock().unwrap();
        let mut count = 0;
        for issue in batch {
            if let Some(existing) = tables.issues.iter_mut().find(|i| i.id == issue.id) {
                *existing = issue;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn count_open_issues(&self, repository_id: Uuid) -> Result<i64, StoreError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .issues
            .iter()
            .filter(|i| i.repository_id == repository_id && !i.closed)
            .count() as i64)
    }

    async fn set_repository_issue_count(
        &self,
        repository_id: Uuid,
        count: i64,
    ) -> Result<(), StoreError> {
        if self.fail_repository_counts.load(Ordering::SeqCst) {
            return Err(injected());
        }
        let mut tables = self.tables.lock().unwrap();
        let repo = tables
            .repositories
            .iter_mut()
            .find(|r| r.id == repository_id)
            .ok_or_else(|| StoreError::not_found_by_id("repository", repository_id))?;
        repo.issue_count = count;
        Ok(())
    }

    async fn set_project_issues_count(&self, project_id: Uuid, count: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let project = tables
            .projects
            .iter_mut()
            .find(|p| p.id == project_id)
            .ok_or_else(|| StoreError::not_found_by_id("project", project_id))?;
        project.issues_count = count;
        Ok(())
    }

    async fn mark_parsed(
        &self,
        repository_id: Uuid,
        project_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let at = at.fixed_offset();
        let mut tables = self.tables.lock().unwrap();
        if let Some(repo) = tables
            .repositories
            .iter_mut()
            .find(|r| r.id == repository_id)
        {
            repo.last_parsed = repo.last_parsed.max(at);
        }
        if let Some(project) = tables.projects.iter_mut().find(|p| p.id == project_id) {
            project.last_parsed = Some(project.last_parsed.map_or(at, |prev| prev.max(at)));
        }
        Ok(())
    }

    async fn stale_open_issues(
        &self,
        repository_id: Uuid,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<IssueModel>, StoreError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .issues
            .iter()
            .filter(|i| {
                i.repository_id == repository_id
                    && !i.closed
                    && i.updated_at.with_timezone(&Utc) < older_than
            })
            .cloned()
            .collect())
    }

    async fn close_issues(&self, ids: &[Uuid], at: DateTime<Utc>) -> Result<u64, StoreError> {
        self.check_writes()?;
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.lock().unwrap();
        let mut closed = 0;
        for issue in tables
            .issues
            .iter_mut()
            .filter(|i| ids.contains(&i.id) && !i.closed)
        {
            issue.closed = true;
            issue.updated_at = at.fixed_offset();
            closed += 1;
        }
        Ok(closed)
    }

    async fn set_repository_tags(
        &self,
        repository_id: Uuid,
        tags: &BTreeSet<String>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let repo = tables
            .repositories
            .iter_mut()
            .find(|r| r.id == repository_id)
            .ok_or_else(|| StoreError::not_found_by_id("repository", repository_id))?;
        repo.tags = json!(tags);
        Ok(())
    }

    async fn set_project_profile(
        &self,
        project_id: Uuid,
        tags: &BTreeSet<String>,
        languages: Option<&BTreeMap<String, f64>>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let project = tables
            .projects
            .iter_mut()
            .find(|p| p.id == project_id)
            .ok_or_else(|| StoreError::not_found_by_id("project", project_id))?;
        project.tags = json!(tags);
        if let Some(languages) = languages {
            project.languages = json!(languages);
        }
        Ok(())
    }
}

// ─── Cache ───────────────────────────────────────────────────────────────────

/// Records requested patterns and reports one removed key per pattern.
#[derive(Default)]
pub(crate) struct RecordingInvalidator {
    patterns: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingInvalidator {
    pub(crate) fn failing() -> Self {
        Self {
            patterns: Mutex::default(),
            fail: true,
        }
    }

    pub(crate) fn patterns(&self) -> Vec<String> {
        self.patterns.lock().unwrap().clone()
    }
}

#[async_trait]
impl CacheInvalidator for RecordingInvalidator {
    async fn invalidate(&self, patterns: &[&str]) -> Result<u64, CacheError> {
        if self.fail {
            return Err(CacheError::Unavailable {
                message: "connection refused".to_string(),
            });
        }
        let mut recorded = self.patterns.lock().unwrap();
        recorded.extend(patterns.iter().map(|p| p.to_string()));
        Ok(patterns.len() as u64)
    }
}
