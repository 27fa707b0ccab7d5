//! `phasewatch` - lifecycle phases for GitHub repositories
//!
//! Collects a small metric vector per repository through octocrab, selects
//! a lifecycle phase from an ordered, configurable rule catalog, and merges
//! the results of many organizations into one deterministic report that is
//! published as a tracking issue.

// Module declarations
pub mod github;
pub mod lifecycle;
pub mod runtime;

// Re-export runtime types
pub use runtime::{AsyncStream, AsyncTask, EmitterBuilder};

// Re-export GitHub client types
pub use github::{Credentials, GitHubClient, GitHubClientBuilder, GitHubError, GitHubResult};

// Re-export the pipeline surface
pub use lifecycle::{
    AggregatedReport, ClassificationResult, ErrorMarker, MetricField, MetricVector,
    MetricsCollector, MetricsSource, Orchestrator, Phase, PhaseCatalog, PhaseRule, RepoSlug,
    ResultPartition, ResultStore, RunConfig, RunMode, ShardRunner, ShardTarget, aggregate,
    classify,
};
