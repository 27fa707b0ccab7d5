//! Repository lifecycle classification pipeline.
//!
//! Metrics are collected per repository, matched against an ordered phase
//! catalog, written to one partition per organization and finally merged
//! into a single sorted report.

mod catalog;
mod checkout;
mod classifier;
mod collector;
mod config;
mod metrics;
mod orchestrator;
mod publish;
mod record;
mod report;
mod shard;
mod source;
mod store;

pub use catalog::{
    CatalogError, Constraint, FieldConstraint, PhaseCatalog, PhaseRule, TERMINAL_RULE_NAMES,
};
pub use checkout::{Checkout, CheckoutError, CheckoutStrategy, GixCheckout, WorkingCopy};
pub use classifier::{Phase, classify};
pub use collector::{
    COMMIT_WINDOW_DAYS, Collection, Measurement, MetricsCollector, MetricsSource, RepoMetadata,
    TerminalOutcome,
};
pub use config::{
    CheckoutSettings, ConfigError, GitHubSettings, Limits, NotifySettings, RunConfig,
    TrackingIssueSettings,
};
pub use metrics::{DegradedMetric, MetricField, MetricKind, MetricValue, MetricVector, Probe};
pub use orchestrator::{Orchestrator, RunMode, ShardOutcome, collect_report};
pub use publish::{
    IssuePublisher, IssueTracker, PublishError, PublishOutcome, WebhookNotifier, deliver,
};
pub use record::{
    ClassificationResult, ERROR_CLASS_PREFIXES, ErrorMarker, Outcome, RepoSlug, ResultRecord,
    is_reserved_label,
};
pub use report::{
    AggregatedReport, NO_DATA_NOTICE, OrganizationSection, REPORT_TITLE, RenderOptions, ReportRow,
    ShardFailure, aggregate,
};
pub use shard::{
    DEFAULT_ARCHIVED_MARKER, EvaluationError, Evaluator, PipelineEvaluator, RepositoryLister,
    ShardError, ShardRunner, ShardSummary, ShardTarget,
};
pub use store::{FsResultStore, MemoryResultStore, ResultPartition, ResultStore, StoreError};
