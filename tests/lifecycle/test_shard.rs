//! Tests for shard execution and per-repository failure handling.

use super::common::*;
use phasewatch::lifecycle::{
    ClassificationResult, ErrorMarker, MemoryResultStore, MetricsCollector, Phase, PhaseCatalog,
    PipelineEvaluator, RepoMetadata, ResultStore, ShardError, ShardRunner, ShardTarget,
};
use regex::Regex;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

fn by_repo(results: &[ClassificationResult]) -> BTreeMap<String, ClassificationResult> {
    results
        .iter()
        .map(|r| (r.repo().to_string(), r.clone()))
        .collect()
}

async fn partition_of(store: &MemoryResultStore, org: &str) -> BTreeMap<String, ClassificationResult> {
    let partition = store
        .read_partition(org)
        .await
        .unwrap()
        .expect("partition written");
    by_repo(partition.results())
}

#[tokio::test]
async fn test_organization_shard_writes_one_result_per_repository() {
    let lister = FakeLister::default().with("acme", &["api", "web", "cli"]);
    let runner = ShardRunner::new(lister, FakeCheckout::default(), ScriptedEvaluator::default());
    let store = MemoryResultStore::new();

    let summary = runner
        .run(&ShardTarget::Organization("acme".to_string()), &store)
        .await
        .unwrap();
    assert_eq!(summary.organization, "acme");
    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.skipped, 0);

    let results = partition_of(&store, "acme").await;
    assert_eq!(
        results.keys().cloned().collect::<Vec<_>>(),
        vec!["acme/api", "acme/cli", "acme/web"]
    );
    assert!(
        results
            .values()
            .all(|r| r.phase() == Some(&Phase::Named("stable".to_string())))
    );
}

#[tokio::test]
async fn test_names_matching_archived_marker_are_skipped() {
    let lister = FakeLister::default().with("acme", &["api", "ARCHIVED-billing", "old-archived"]);
    let runner = ShardRunner::new(lister, FakeCheckout::default(), ScriptedEvaluator::default());
    let store = MemoryResultStore::new();

    let summary = runner
        .run(&ShardTarget::Organization("acme".to_string()), &store)
        .await
        .unwrap();
    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.skipped, 2);
    assert_eq!(
        partition_of(&store, "acme").await.keys().cloned().collect::<Vec<_>>(),
        vec!["acme/api"]
    );
}

#[tokio::test]
async fn test_custom_and_disabled_archived_marker() {
    let names = ["api", "legacy-api", "archived-web"];

    let custom = ShardRunner::new(
        FakeLister::default().with("acme", &names),
        FakeCheckout::default(),
        ScriptedEvaluator::default(),
    )
    .with_archived_marker(Some(Regex::new("^legacy-").unwrap()));
    let store = MemoryResultStore::new();
    let summary = custom
        .run(&ShardTarget::Organization("acme".to_string()), &store)
        .await
        .unwrap();
    assert_eq!((summary.attempted, summary.skipped), (2, 1));

    let disabled = ShardRunner::new(
        FakeLister::default().with("acme", &names),
        FakeCheckout::default(),
        ScriptedEvaluator::default(),
    )
    .with_archived_marker(None);
    let store = MemoryResultStore::new();
    let summary = disabled
        .run(&ShardTarget::Organization("acme".to_string()), &store)
        .await
        .unwrap();
    assert_eq!((summary.attempted, summary.skipped), (3, 0));
}

#[tokio::test]
async fn test_every_failure_kind_maps_to_its_marker() {
    let lister = FakeLister::default().with(
        "acme",
        &["ok", "no-clone", "crashes", "silent", "no-phase", "bad-phase"],
    );
    let checkout = FakeCheckout::default().failing("acme/no-clone");
    let evaluator = ScriptedEvaluator::default()
        .with("acme/crashes", Scripted::Fail("exit status 2".to_string()))
        .with("acme/silent", Scripted::Nothing)
        .with("acme/no-phase", Scripted::Document(json!({ "repo": "acme/no-phase" })))
        .with("acme/bad-phase", Scripted::Document(json!({ "phase": 42 })));
    let runner = ShardRunner::new(lister, checkout, evaluator).with_archived_marker(None);
    let store = MemoryResultStore::new();

    let summary = runner
        .run(&ShardTarget::Organization("acme".to_string()), &store)
        .await
        .unwrap();
    assert_eq!(summary.attempted, 6);
    assert_eq!(summary.failed, 5);

    let results = partition_of(&store, "acme").await;
    let marker = |repo: &str| results[repo].error_marker();
    assert_eq!(marker("acme/ok"), None);
    assert_eq!(marker("acme/no-clone"), Some(ErrorMarker::CheckoutFailed));
    assert_eq!(marker("acme/crashes"), Some(ErrorMarker::ClassificationError));
    assert_eq!(marker("acme/silent"), Some(ErrorMarker::ClassificationError));
    assert_eq!(marker("acme/no-phase"), Some(ErrorMarker::UnknownParseError));
    assert_eq!(marker("acme/bad-phase"), Some(ErrorMarker::UnknownParseError));

    assert_eq!(results["acme/no-clone"].phase_label(), "Checkout Failed");
    assert_eq!(results["acme/crashes"].phase_label(), "Classification Error");
    assert_eq!(results["acme/no-phase"].phase_label(), "Unknown");
    assert!(results.values().filter(|r| r.repo().name() != "ok").all(|r| r.is_error_class()));
}

#[tokio::test]
async fn test_document_metrics_are_read_back() {
    let document = json!({
        "repo": "acme/api",
        "phase": "maintained",
        "metrics": { "contributors": 4, "commits90d": 17, "hasRelease": true },
        "degraded": [{ "field": "contributors", "cause": "rate limited" }]
    });
    let runner = ShardRunner::new(
        FakeLister::default().with("acme", &["api"]),
        FakeCheckout::default(),
        ScriptedEvaluator::default().with("acme/api", Scripted::Document(document)),
    );
    let store = MemoryResultStore::new();
    runner
        .run(&ShardTarget::Organization("acme".to_string()), &store)
        .await
        .unwrap();

    let results = partition_of(&store, "acme").await;
    let api = &results["acme/api"];
    assert_eq!(api.phase_label(), "maintained");
    let metrics = api.metrics().unwrap();
    assert_eq!(metrics.contributors, Some(4));
    assert_eq!(metrics.commits_90d, Some(17));
    assert_eq!(api.degraded().len(), 1);
}

#[tokio::test]
async fn test_listing_failure_fails_the_shard_without_a_partition() {
    let runner = ShardRunner::new(
        FakeLister::default().broken("acme"),
        FakeCheckout::default(),
        ScriptedEvaluator::default(),
    );
    let store = MemoryResultStore::new();

    let err = runner
        .run(&ShardTarget::Organization("acme".to_string()), &store)
        .await
        .unwrap_err();
    assert!(matches!(err, ShardError::Listing { ref organization, .. } if organization == "acme"));
    assert!(store.read_partition("acme").await.unwrap().is_none());
}

#[tokio::test]
async fn test_single_repository_target_bypasses_listing_and_marker() {
    let checkout = FakeCheckout::default();
    let calls = Arc::clone(&checkout.calls);
    let runner = ShardRunner::new(
        FakeLister::default().broken("acme"),
        checkout,
        ScriptedEvaluator::default(),
    );
    let store = MemoryResultStore::new();

    let summary = runner
        .run(&ShardTarget::Repository(slug("acme/archived-tools")), &store)
        .await
        .unwrap();
    assert_eq!(summary.organization, "acme");
    assert_eq!((summary.attempted, summary.skipped), (1, 0));
    assert!(partition_of(&store, "acme").await.contains_key("acme/archived-tools"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_organization_writes_empty_partition() {
    let runner = ShardRunner::new(
        FakeLister::default().with("quiet", &[]),
        FakeCheckout::default(),
        ScriptedEvaluator::default(),
    );
    let store = MemoryResultStore::new();

    let summary = runner
        .run(&ShardTarget::Organization("quiet".to_string()), &store)
        .await
        .unwrap();
    assert_eq!(summary.attempted, 0);
    assert!(partition_of(&store, "quiet").await.is_empty());
}

#[tokio::test]
async fn test_second_run_of_same_organization_is_rejected() {
    let runner = ShardRunner::new(
        FakeLister::default().with("acme", &["api"]),
        FakeCheckout::default(),
        ScriptedEvaluator::default(),
    );
    let store = MemoryResultStore::new();
    let target = ShardTarget::Organization("acme".to_string());

    runner.run(&target, &store).await.unwrap();
    let err = runner.run(&target, &store).await.unwrap_err();
    assert!(matches!(err, ShardError::Store { .. }));
}

#[tokio::test]
async fn test_parallel_repositories_still_yield_one_result_each() {
    let names: Vec<String> = (0..25).map(|i| format!("repo-{i:02}")).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let runner = ShardRunner::new(
        FakeLister::default().with("acme", &name_refs),
        FakeCheckout::default(),
        ScriptedEvaluator::default(),
    )
    .with_repo_concurrency(8);
    let store = MemoryResultStore::new();

    runner
        .run(&ShardTarget::Organization("acme".to_string()), &store)
        .await
        .unwrap();
    let results = partition_of(&store, "acme").await;
    assert_eq!(results.len(), 25);
}

#[tokio::test]
async fn test_checkout_runs_once_per_attempted_repository() {
    let checkout = FakeCheckout::default();
    let calls = Arc::clone(&checkout.calls);
    let runner = ShardRunner::new(
        FakeLister::default().with("acme", &["a", "b", "archived-c"]),
        checkout,
        ScriptedEvaluator::default(),
    );
    let store = MemoryResultStore::new();
    runner
        .run(&ShardTarget::Organization("acme".to_string()), &store)
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_builtin_pipeline_classifies_end_to_end() {
    let catalog = PhaseCatalog::from_yaml_str(
        "phases:\n  - name: spark\n    rules:\n      contributors: { max: 2 }\n      hasRelease: false\n",
    )
    .unwrap();

    let mut archived = FakeRepo::healthy();
    archived.metadata = Ok(RepoMetadata {
        archived: true,
        ..RepoMetadata::default()
    });
    let source = FakeSource::default()
        .with(
            "acme/tiny",
            FakeRepo {
                contributors: Ok(1),
                release: Ok(None),
                ..FakeRepo::healthy()
            },
        )
        .with("acme/retired", archived)
        .with(
            "acme/locked",
            FakeRepo {
                metadata: Err("403".to_string()),
                ..FakeRepo::healthy()
            },
        )
        .with("acme/busy", FakeRepo::healthy());

    let evaluator = PipelineEvaluator::new(
        MetricsCollector::new(source, Duration::from_secs(5)),
        Arc::new(catalog),
        fixed_now(),
    );
    let runner = ShardRunner::new(
        FakeLister::default().with("acme", &["tiny", "retired", "locked", "busy"]),
        FakeCheckout::default(),
        evaluator,
    );
    let store = MemoryResultStore::new();
    runner
        .run(&ShardTarget::Organization("acme".to_string()), &store)
        .await
        .unwrap();

    let results = partition_of(&store, "acme").await;
    assert_eq!(results["acme/tiny"].phase(), Some(&Phase::Named("spark".to_string())));
    assert_eq!(results["acme/retired"].phase(), Some(&Phase::Archive));
    assert_eq!(results["acme/locked"].phase(), Some(&Phase::Inaccessible));
    assert_eq!(results["acme/busy"].phase(), Some(&Phase::Unknown));
    assert!(!results["acme/retired"].is_engageable());
    assert!(!results["acme/locked"].is_engageable());
    assert!(results["acme/tiny"].is_engageable());
    assert_eq!(results["acme/tiny"].metrics().and_then(|m| m.contributors), Some(1));
}

#[tokio::test]
async fn test_failed_checkout_keeps_terminal_phase_from_metadata() {
    let mut archived = FakeRepo::healthy();
    archived.metadata = Ok(RepoMetadata {
        archived: true,
        ..RepoMetadata::default()
    });
    let source = FakeSource::default()
        .with("acme/private", FakeRepo::healthy())
        .with("acme/retired", archived);
    let evaluator = PipelineEvaluator::new(
        MetricsCollector::new(source, Duration::from_secs(5)),
        Arc::new(PhaseCatalog::default()),
        fixed_now(),
    );
    let checkout = FakeCheckout::default()
        .failing("acme/private")
        .failing("acme/retired")
        .failing("acme/ghost");
    let runner = ShardRunner::new(
        FakeLister::default().with("acme", &["private", "retired", "ghost"]),
        checkout,
        evaluator,
    );
    let store = MemoryResultStore::new();
    let summary = runner
        .run(&ShardTarget::Organization("acme".to_string()), &store)
        .await
        .unwrap();
    assert_eq!(summary.failed, 1);

    let results = partition_of(&store, "acme").await;
    // Readable through the API but not clonable: a genuine checkout failure.
    assert_eq!(results["acme/private"].error_marker(), Some(ErrorMarker::CheckoutFailed));
    assert_eq!(results["acme/private"].phase_label(), "Checkout Failed");
    assert_eq!(results["acme/retired"].phase(), Some(&Phase::Archive));
    assert_eq!(results["acme/ghost"].phase(), Some(&Phase::Inaccessible));
    assert!(!results["acme/ghost"].is_engageable());
}

#[tokio::test]
async fn test_missing_induction_repository_is_inaccessible_with_checkout_on() {
    let evaluator = PipelineEvaluator::new(
        MetricsCollector::new(FakeSource::default(), Duration::from_secs(5)),
        Arc::new(PhaseCatalog::default()),
        fixed_now(),
    );
    let runner = ShardRunner::new(
        FakeLister::default(),
        FakeCheckout::default().failing("acme/ghost"),
        evaluator,
    );
    let store = MemoryResultStore::new();
    runner
        .run(&ShardTarget::Repository(slug("acme/ghost")), &store)
        .await
        .unwrap();

    let results = partition_of(&store, "acme").await;
    assert_eq!(results["acme/ghost"].phase_label(), "Inaccessible");
    assert_eq!(runner.evaluator().collector().source().sub_queries(), 0);
}
