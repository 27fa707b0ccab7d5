//! Fakes for the pipeline's remote seams.

use chrono::{DateTime, TimeZone, Utc};
use phasewatch::GitHubError;
use phasewatch::GitHubResult;
use phasewatch::lifecycle::{
    Checkout, CheckoutError, EvaluationError, Evaluator, MetricsSource, RepoMetadata, RepoSlug,
    RepositoryLister, WorkingCopy,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    fixed_now() - chrono::Duration::days(days)
}

pub fn slug(s: &str) -> RepoSlug {
    s.parse().unwrap()
}

/// Canned answers for one repository. `Err` strings become API errors.
#[derive(Clone)]
pub struct FakeRepo {
    pub metadata: Result<RepoMetadata, String>,
    pub contributors: Result<u64, String>,
    pub commits: Result<u64, String>,
    pub release: Result<Option<DateTime<Utc>>, String>,
}

impl FakeRepo {
    pub fn healthy() -> Self {
        Self {
            metadata: Ok(RepoMetadata {
                created_at: Some(days_ago(730)),
                pushed_at: Some(days_ago(3)),
                archived: false,
            }),
            contributors: Ok(12),
            commits: Ok(40),
            release: Ok(Some(days_ago(20))),
        }
    }
}

#[derive(Default)]
pub struct FakeSource {
    repos: HashMap<String, FakeRepo>,
    pub metadata_calls: AtomicUsize,
    pub sub_query_calls: AtomicUsize,
}

impl FakeSource {
    pub fn with(mut self, slug: &str, repo: FakeRepo) -> Self {
        self.repos.insert(slug.to_string(), repo);
        self
    }

    fn repo(&self, slug: &RepoSlug) -> GitHubResult<&FakeRepo> {
        self.repos
            .get(&slug.to_string())
            .ok_or_else(|| GitHubError::NotFound(slug.to_string()))
    }

    pub fn sub_queries(&self) -> usize {
        self.sub_query_calls.load(Ordering::SeqCst)
    }
}

impl MetricsSource for FakeSource {
    async fn metadata(&self, slug: &RepoSlug) -> GitHubResult<RepoMetadata> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.repo(slug)?.metadata.clone().map_err(GitHubError::Api)
    }

    async fn contributor_count(&self, slug: &RepoSlug) -> GitHubResult<u64> {
        self.sub_query_calls.fetch_add(1, Ordering::SeqCst);
        self.repo(slug)?.contributors.clone().map_err(GitHubError::Api)
    }

    async fn commit_count_since(&self, slug: &RepoSlug, _since: DateTime<Utc>) -> GitHubResult<u64> {
        self.sub_query_calls.fetch_add(1, Ordering::SeqCst);
        self.repo(slug)?.commits.clone().map_err(GitHubError::Api)
    }

    async fn latest_release(&self, slug: &RepoSlug) -> GitHubResult<Option<DateTime<Utc>>> {
        self.sub_query_calls.fetch_add(1, Ordering::SeqCst);
        self.repo(slug)?.release.clone().map_err(GitHubError::Api)
    }
}

/// Organization listings; organizations in `broken` fail to list.
#[derive(Default)]
pub struct FakeLister {
    orgs: HashMap<String, Vec<String>>,
    broken: HashSet<String>,
}

impl FakeLister {
    pub fn with(mut self, org: &str, names: &[&str]) -> Self {
        self.orgs
            .insert(org.to_string(), names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn broken(mut self, org: &str) -> Self {
        self.broken.insert(org.to_string());
        self
    }
}

impl RepositoryLister for FakeLister {
    async fn list_repositories(&self, organization: &str) -> GitHubResult<Vec<String>> {
        if self.broken.contains(organization) {
            return Err(GitHubError::Api(format!("listing {organization} exploded")));
        }
        Ok(self.orgs.get(organization).cloned().unwrap_or_default())
    }
}

/// Checkout that fails for the listed slugs and succeeds without a
/// directory otherwise.
#[derive(Default)]
pub struct FakeCheckout {
    failing: HashSet<String>,
    pub calls: Arc<AtomicUsize>,
}

impl FakeCheckout {
    pub fn failing(mut self, slug: &str) -> Self {
        self.failing.insert(slug.to_string());
        self
    }
}

impl Checkout for FakeCheckout {
    async fn materialize(&self, slug: &RepoSlug) -> Result<WorkingCopy, CheckoutError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&slug.to_string()) {
            return Err(CheckoutError::Clone {
                repo: slug.to_string(),
                reason: "remote hung up".to_string(),
            });
        }
        Ok(WorkingCopy::none())
    }
}

/// What the scripted evaluator returns for a slug.
#[derive(Clone)]
pub enum Scripted {
    Document(Value),
    Nothing,
    Fail(String),
    Panic,
}

/// Evaluator with a fixed answer per slug; unknown slugs get phase `stable`.
#[derive(Default)]
pub struct ScriptedEvaluator {
    answers: HashMap<String, Scripted>,
}

impl ScriptedEvaluator {
    pub fn with(mut self, slug: &str, answer: Scripted) -> Self {
        self.answers.insert(slug.to_string(), answer);
        self
    }
}

impl Evaluator for ScriptedEvaluator {
    async fn evaluate(
        &self,
        slug: &RepoSlug,
        _workdir: Option<&Path>,
    ) -> Result<Option<Value>, EvaluationError> {
        match self.answers.get(&slug.to_string()) {
            Some(Scripted::Document(doc)) => Ok(Some(doc.clone())),
            Some(Scripted::Nothing) => Ok(None),
            Some(Scripted::Fail(reason)) => Err(EvaluationError(reason.clone())),
            Some(Scripted::Panic) => panic!("evaluator blew up on {slug}"),
            None => Ok(Some(serde_json::json!({ "repo": slug.to_string(), "phase": "stable" }))),
        }
    }
}
