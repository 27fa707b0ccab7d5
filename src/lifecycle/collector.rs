//! Metric collection with per-metric degradation.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{debug, warn};
use std::future::Future;
use std::time::Duration;

use crate::github::{GitHubError, GitHubResult};

use super::metrics::{DegradedMetric, MetricField, MetricVector, Probe};
use super::record::RepoSlug;

/// Window used for the commit velocity metric.
pub const COMMIT_WINDOW_DAYS: i64 = 90;

const SECONDS_PER_DAY: f64 = 86_400.0;
const DAYS_PER_YEAR: f64 = 365.25;

/// Repository-level facts read in the first query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RepoMetadata {
    pub created_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub archived: bool,
}

/// Remote reads the collector needs.
pub trait MetricsSource: Send + Sync {
    fn metadata(&self, slug: &RepoSlug) -> impl Future<Output = GitHubResult<RepoMetadata>> + Send;

    fn contributor_count(&self, slug: &RepoSlug) -> impl Future<Output = GitHubResult<u64>> + Send;

    fn commit_count_since(
        &self,
        slug: &RepoSlug,
        since: DateTime<Utc>,
    ) -> impl Future<Output = GitHubResult<u64>> + Send;

    /// Publication time of the latest release, `Ok(None)` when there is none.
    fn latest_release(
        &self,
        slug: &RepoSlug,
    ) -> impl Future<Output = GitHubResult<Option<DateTime<Utc>>>> + Send;
}

/// Outcome that skips metric collection entirely.
#[derive(Clone, Debug, PartialEq)]
pub enum TerminalOutcome {
    Archived,
    Inaccessible { cause: String },
}

/// A fully collected vector with the provenance of defaulted fields.
#[derive(Clone, Debug, PartialEq)]
pub struct Measurement {
    pub vector: MetricVector,
    pub degraded: Vec<DegradedMetric>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Collection {
    Terminal(TerminalOutcome),
    Measured(Measurement),
}

/// Builds a [`MetricVector`] for one repository from a [`MetricsSource`].
///
/// Stateless apart from its source; safe to share across shards.
pub struct MetricsCollector<S> {
    source: S,
    api_timeout: Duration,
}

impl<S: MetricsSource> MetricsCollector<S> {
    pub fn new(source: S, api_timeout: Duration) -> Self {
        Self {
            source,
            api_timeout,
        }
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Collect metrics for `slug` as of `now`.
    ///
    /// A failed metadata read ends collection with `Inaccessible`, an
    /// archived flag with `Archived`; no other query is issued in either
    /// case. The three activity queries fall back to their defaults on
    /// failure and never retry.
    pub async fn collect(&self, slug: &RepoSlug, now: DateTime<Utc>) -> Collection {
        let metadata = match self.bounded("metadata", self.source.metadata(slug)).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Metadata unavailable for {slug}: {e}");
                return Collection::Terminal(TerminalOutcome::Inaccessible {
                    cause: e.to_string(),
                });
            }
        };

        if metadata.archived {
            debug!("{slug} is archived; skipping metric collection");
            return Collection::Terminal(TerminalOutcome::Archived);
        }

        let since = now - ChronoDuration::days(COMMIT_WINDOW_DAYS);
        let (contributors, commits, release) = futures::join!(
            self.bounded("contributors", self.source.contributor_count(slug)),
            self.bounded("commits", self.source.commit_count_since(slug, since)),
            self.bounded("latest release", self.source.latest_release(slug)),
        );

        let contributors = Probe::from_result(contributors, 0);
        let commits = Probe::from_result(commits, 0);
        let release = Probe::from_result(release, None);

        let mut degraded = contributors.degradations(&[MetricField::Contributors]);
        degraded.extend(commits.degradations(&[MetricField::Commits90d]));
        degraded.extend(
            release.degradations(&[MetricField::LastReleaseDays, MetricField::HasRelease]),
        );
        for entry in &degraded {
            warn!("Degraded {} for {slug}: {}", entry.field, entry.cause);
        }

        let last_release = release.into_value();
        let vector = MetricVector {
            age_years: metadata
                .created_at
                .map(|created| days_between(created, now) / DAYS_PER_YEAR),
            silent_days: metadata.pushed_at.map(|pushed| days_between(pushed, now)),
            contributors: Some(contributors.into_value()),
            commits_90d: Some(commits.into_value()),
            last_release_days: Some(
                last_release.map_or(f64::INFINITY, |published| days_between(published, now)),
            ),
            has_release: Some(last_release.is_some()),
            archived: Some(false),
            reachable: Some(true),
        };

        Collection::Measured(Measurement { vector, degraded })
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        query: impl Future<Output = GitHubResult<T>>,
    ) -> GitHubResult<T> {
        tokio::time::timeout(self.api_timeout, query)
            .await
            .map_err(|_| GitHubError::Timeout {
                operation: operation.to_string(),
                after: self.api_timeout,
            })?
    }
}

/// Fractional days from `earlier` to `later`, clamped at zero.
fn days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let seconds = (later - earlier).num_seconds().max(0) as f64;
    seconds / SECONDS_PER_DAY
}
