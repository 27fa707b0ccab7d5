//! Per-organization shard execution.
//!
//! A shard lists the repositories of one organization, then for each one
//! materializes a working copy, runs the classification step and reads the
//! phase back out of the step's result document. When the checkout fails the
//! step still runs without a working copy, so a repository that cannot be
//! reached at all is recorded as `Inaccessible` rather than `Checkout Failed`. Every failure after the
//! listing is recorded against its repository; only the listing itself can
//! fail a shard.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use lazy_static::lazy_static;
use log::{error, info, warn};
use regex::Regex;
use serde_json::Value;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::github::{GitHubError, GitHubResult};

use super::catalog::PhaseCatalog;
use super::checkout::Checkout;
use super::classifier::{Phase, classify};
use super::collector::{Collection, MetricsCollector, MetricsSource, TerminalOutcome};
use super::metrics::{DegradedMetric, MetricVector};
use super::record::{ClassificationResult, ErrorMarker, RepoSlug};
use super::store::{ResultPartition, ResultStore, StoreError};

/// Default pattern for repository names flagged as archived.
pub const DEFAULT_ARCHIVED_MARKER: &str = "(?i)archived";

lazy_static! {
    static ref DEFAULT_ARCHIVED_RE: Result<Regex, regex::Error> =
        Regex::new(DEFAULT_ARCHIVED_MARKER);
}

#[derive(Debug, Error)]
pub enum ShardError {
    #[error("Listing repositories of {organization} failed: {source}")]
    Listing {
        organization: String,
        #[source]
        source: GitHubError,
    },

    #[error("Storing results of {organization} failed: {source}")]
    Store {
        organization: String,
        #[source]
        source: StoreError,
    },
}

/// Enumerates the repositories of an organization.
pub trait RepositoryLister: Send + Sync {
    fn list_repositories(
        &self,
        organization: &str,
    ) -> impl Future<Output = GitHubResult<Vec<String>>> + Send;
}

/// Failure of the classification step itself.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct EvaluationError(pub String);

/// The classification step run against a working copy.
///
/// `Ok(None)` means the step finished without producing a result document.
pub trait Evaluator: Send + Sync {
    fn evaluate(
        &self,
        slug: &RepoSlug,
        workdir: Option<&Path>,
    ) -> impl Future<Output = Result<Option<Value>, EvaluationError>> + Send;
}

/// The built-in step: collect metrics, classify, emit the record document.
pub struct PipelineEvaluator<S> {
    collector: MetricsCollector<S>,
    catalog: Arc<PhaseCatalog>,
    now: DateTime<Utc>,
}

impl<S: MetricsSource> PipelineEvaluator<S> {
    /// `now` is fixed for the whole run so every shard measures age and
    /// recency against the same instant.
    pub fn new(collector: MetricsCollector<S>, catalog: Arc<PhaseCatalog>, now: DateTime<Utc>) -> Self {
        Self {
            collector,
            catalog,
            now,
        }
    }

    #[must_use]
    pub fn collector(&self) -> &MetricsCollector<S> {
        &self.collector
    }

    /// Collect and classify without going through the record document.
    pub async fn classify_repository(&self, slug: &RepoSlug) -> ClassificationResult {
        match self.collector.collect(slug, self.now).await {
            Collection::Terminal(TerminalOutcome::Archived) => {
                ClassificationResult::classified(slug.clone(), Phase::Archive, None, Vec::new())
            }
            Collection::Terminal(TerminalOutcome::Inaccessible { .. }) => {
                ClassificationResult::classified(slug.clone(), Phase::Inaccessible, None, Vec::new())
            }
            Collection::Measured(measurement) => {
                let phase = classify(&measurement.vector, &self.catalog);
                ClassificationResult::classified(
                    slug.clone(),
                    phase,
                    Some(measurement.vector),
                    measurement.degraded,
                )
            }
        }
    }
}

impl<S: MetricsSource> Evaluator for PipelineEvaluator<S> {
    async fn evaluate(
        &self,
        slug: &RepoSlug,
        _workdir: Option<&Path>,
    ) -> Result<Option<Value>, EvaluationError> {
        let result = self.classify_repository(slug).await;
        serde_json::to_value(&result)
            .map(Some)
            .map_err(|e| EvaluationError(format!("cannot encode result for {slug}: {e}")))
    }
}

/// What a shard covers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShardTarget {
    /// Every repository of the organization.
    Organization(String),
    /// Exactly one repository; its owner names the partition.
    Repository(RepoSlug),
}

impl ShardTarget {
    /// Partition key.
    #[must_use]
    pub fn organization(&self) -> &str {
        match self {
            ShardTarget::Organization(org) => org,
            ShardTarget::Repository(slug) => slug.owner(),
        }
    }
}

/// Counts reported by a finished shard.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShardSummary {
    pub organization: String,
    pub attempted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Runs one shard and writes its partition.
pub struct ShardRunner<L, C, E> {
    lister: L,
    checkout: C,
    evaluator: E,
    archived_marker: Option<Regex>,
    repo_concurrency: usize,
}

impl<L, C, E> ShardRunner<L, C, E>
where
    L: RepositoryLister,
    C: Checkout,
    E: Evaluator,
{
    pub fn new(lister: L, checkout: C, evaluator: E) -> Self {
        Self {
            lister,
            checkout,
            evaluator,
            archived_marker: DEFAULT_ARCHIVED_RE.as_ref().ok().cloned(),
            repo_concurrency: 1,
        }
    }

    /// Names matching `marker` are skipped without any remote call.
    /// `None` disables skipping.
    #[must_use]
    pub fn with_archived_marker(mut self, marker: Option<Regex>) -> Self {
        self.archived_marker = marker;
        self
    }

    /// Repositories processed at once inside this shard (minimum 1).
    #[must_use]
    pub fn with_repo_concurrency(mut self, limit: usize) -> Self {
        self.repo_concurrency = limit.max(1);
        self
    }

    #[must_use]
    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// Process `target` and write its partition to `store`.
    ///
    /// Exactly one result is written per attempted repository. A repository
    /// named explicitly as the target is always attempted, marker or not.
    pub async fn run<S: ResultStore>(
        &self,
        target: &ShardTarget,
        store: &S,
    ) -> Result<ShardSummary, ShardError> {
        let organization = target.organization().to_string();
        info!("Shard {organization}: starting");

        let (slugs, skipped) = match target {
            ShardTarget::Repository(slug) => (vec![slug.clone()], 0),
            ShardTarget::Organization(org) => {
                let names = self
                    .lister
                    .list_repositories(org)
                    .await
                    .map_err(|source| {
                        error!("Shard {org}: repository listing failed: {source}");
                        ShardError::Listing {
                            organization: org.clone(),
                            source,
                        }
                    })?;
                let total = names.len();
                let kept: Vec<RepoSlug> = names
                    .into_iter()
                    .filter(|name| !self.is_marked_archived(name))
                    .map(|name| RepoSlug::new(org.clone(), name))
                    .collect();
                let skipped = total - kept.len();
                (kept, skipped)
            }
        };

        let results: Vec<ClassificationResult> = stream::iter(slugs)
            .map(|slug| async move { self.process(&slug).await })
            .buffer_unordered(self.repo_concurrency)
            .collect()
            .await;

        let failed = results.iter().filter(|r| r.error_marker().is_some()).count();
        let summary = ShardSummary {
            organization: organization.clone(),
            attempted: results.len(),
            skipped,
            failed,
        };

        store
            .write_partition(&ResultPartition::new(organization.clone(), results))
            .await
            .map_err(|source| ShardError::Store {
                organization: organization.clone(),
                source,
            })?;

        info!(
            "Shard {organization}: {} classified, {} failed, {} skipped by name",
            summary.attempted - summary.failed,
            summary.failed,
            summary.skipped
        );
        Ok(summary)
    }

    fn is_marked_archived(&self, name: &str) -> bool {
        self.archived_marker
            .as_ref()
            .is_some_and(|marker| marker.is_match(name))
    }

    async fn process(&self, slug: &RepoSlug) -> ClassificationResult {
        let working_copy = match self.checkout.materialize(slug).await {
            Ok(copy) => copy,
            Err(e) => {
                warn!("Checkout failed for {slug}: {e}");
                return self.after_failed_checkout(slug, e.to_string()).await;
            }
        };

        let document = match self.evaluator.evaluate(slug, working_copy.path()).await {
            Ok(Some(document)) => document,
            Ok(None) => {
                warn!("Classification of {slug} produced no output");
                return ClassificationResult::failed(
                    slug.clone(),
                    ErrorMarker::ClassificationError,
                    "classification produced no output",
                );
            }
            Err(e) => {
                warn!("Classification of {slug} failed: {e}");
                return ClassificationResult::failed(
                    slug.clone(),
                    ErrorMarker::ClassificationError,
                    e.to_string(),
                );
            }
        };

        read_back(slug, &document)
    }

    /// A clone fails for unreachable repositories too. Those keep their
    /// terminal phase; anything else is a checkout failure.
    async fn after_failed_checkout(&self, slug: &RepoSlug, reason: String) -> ClassificationResult {
        if let Ok(Some(document)) = self.evaluator.evaluate(slug, None).await {
            let result = read_back(slug, &document);
            if matches!(result.phase(), Some(Phase::Inaccessible | Phase::Archive)) {
                return result;
            }
        }
        ClassificationResult::failed(slug.clone(), ErrorMarker::CheckoutFailed, reason)
    }
}

/// Rebuild a result from the step's document; only `phase` is required.
fn read_back(slug: &RepoSlug, document: &Value) -> ClassificationResult {
    let Some(label) = document.get("phase").and_then(Value::as_str) else {
        warn!("Result for {slug} has no readable phase");
        return ClassificationResult::failed(
            slug.clone(),
            ErrorMarker::UnknownParseError,
            "result has no readable phase",
        );
    };

    let metrics = document
        .get("metrics")
        .and_then(|m| serde_json::from_value::<MetricVector>(m.clone()).ok());
    let degraded = document
        .get("degraded")
        .and_then(|d| serde_json::from_value::<Vec<DegradedMetric>>(d.clone()).ok())
        .unwrap_or_default();

    ClassificationResult::classified(slug.clone(), Phase::from_label(label), metrics, degraded)
}
