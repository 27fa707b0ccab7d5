//! Fan-out over organizations, fan-in into one report.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use log::{error, info, warn};
use std::sync::Arc;

use crate::runtime::AsyncTask;

use super::checkout::Checkout;
use super::record::RepoSlug;
use super::report::{AggregatedReport, ShardFailure, aggregate};
use super::shard::{Evaluator, RepositoryLister, ShardRunner, ShardSummary, ShardTarget};
use super::store::{ResultPartition, ResultStore};

/// Which organizations a run covers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// Every configured organization.
    Review,
    /// One organization, optionally narrowed to one repository.
    Induction {
        organization: String,
        repository: Option<String>,
    },
}

impl RunMode {
    /// Shard targets for this mode, deduplicated, in a stable order.
    #[must_use]
    pub fn targets(&self, organizations: &[String]) -> Vec<ShardTarget> {
        match self {
            RunMode::Review => {
                let mut orgs: Vec<String> = organizations.to_vec();
                orgs.sort();
                orgs.dedup();
                orgs.into_iter().map(ShardTarget::Organization).collect()
            }
            RunMode::Induction {
                organization,
                repository: None,
            } => vec![ShardTarget::Organization(organization.clone())],
            RunMode::Induction {
                organization,
                repository: Some(name),
            } => vec![ShardTarget::Repository(RepoSlug::new(
                organization.clone(),
                name.clone(),
            ))],
        }
    }
}

/// Final state of one shard.
#[derive(Debug)]
pub struct ShardOutcome {
    pub organization: String,
    pub result: Result<ShardSummary, String>,
}

/// Runs shards in parallel and aggregates once all of them have ended.
pub struct Orchestrator<L, C, E, S> {
    runner: Arc<ShardRunner<L, C, E>>,
    store: Arc<S>,
    shard_concurrency: usize,
}

impl<L, C, E, S> Orchestrator<L, C, E, S>
where
    L: RepositoryLister + 'static,
    C: Checkout + 'static,
    E: Evaluator + 'static,
    S: ResultStore + 'static,
{
    pub fn new(runner: ShardRunner<L, C, E>, store: Arc<S>, shard_concurrency: usize) -> Self {
        Self {
            runner: Arc::new(runner),
            store,
            shard_concurrency: shard_concurrency.max(1),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run every target, each on its own task.
    ///
    /// Returns only after every shard has ended. A shard that errors or
    /// panics is reported in its outcome and never affects its siblings.
    pub async fn run_shards(&self, targets: Vec<ShardTarget>) -> Vec<ShardOutcome> {
        let mut outcomes: Vec<ShardOutcome> = stream::iter(targets)
            .map(|target| {
                let runner = Arc::clone(&self.runner);
                let store = Arc::clone(&self.store);
                let organization = target.organization().to_string();
                async move {
                    let task = AsyncTask::spawn_async(async move {
                        runner.run(&target, store.as_ref()).await
                    });
                    let result = match task.await {
                        Ok(Ok(summary)) => Ok(summary),
                        Ok(Err(e)) => Err(e.to_string()),
                        Err(e) => {
                            error!("Shard {organization} aborted: {e}");
                            Err(format!("shard aborted: {e}"))
                        }
                    };
                    ShardOutcome {
                        organization,
                        result,
                    }
                }
            })
            .buffer_unordered(self.shard_concurrency)
            .collect()
            .await;
        outcomes.sort_by(|a, b| a.organization.cmp(&b.organization));
        outcomes
    }

    /// Run all shards, wait for all of them, then aggregate their partitions.
    pub async fn survey(
        &self,
        targets: Vec<ShardTarget>,
        generated_at: DateTime<Utc>,
        run_ref: &str,
    ) -> AggregatedReport {
        let outcomes = self.run_shards(targets).await;
        collect_report(self.store.as_ref(), &outcomes, generated_at, run_ref).await
    }
}

/// Read the partitions of every shard in `outcomes` and aggregate them.
///
/// A successful shard whose partition cannot be read is reported as failed,
/// so every expected organization shows up either as a section or as a
/// failure.
pub async fn collect_report<S: ResultStore>(
    store: &S,
    outcomes: &[ShardOutcome],
    generated_at: DateTime<Utc>,
    run_ref: &str,
) -> AggregatedReport {
    let mut partitions: Vec<ResultPartition> = Vec::new();
    let mut failures: Vec<ShardFailure> = Vec::new();

    for outcome in outcomes {
        if let Err(reason) = &outcome.result {
            failures.push(ShardFailure {
                organization: outcome.organization.clone(),
                reason: reason.clone(),
            });
            continue;
        }
        match store.read_partition(&outcome.organization).await {
            Ok(Some(partition)) => partitions.push(partition),
            Ok(None) => {
                warn!("Partition for {} is missing", outcome.organization);
                failures.push(ShardFailure {
                    organization: outcome.organization.clone(),
                    reason: "partition missing after shard completed".to_string(),
                });
            }
            Err(e) => {
                warn!("Partition for {} unreadable: {e}", outcome.organization);
                failures.push(ShardFailure {
                    organization: outcome.organization.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        "Aggregating {} partitions ({} failed shards)",
        partitions.len(),
        failures.len()
    );
    aggregate(partitions, failures, generated_at, run_ref)
}
