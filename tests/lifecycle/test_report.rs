//! Tests for aggregation and markdown rendering.

use super::common::*;
use phasewatch::lifecycle::{
    ClassificationResult, ErrorMarker, NO_DATA_NOTICE, Phase, REPORT_TITLE, RenderOptions,
    ResultPartition, ShardFailure, aggregate,
};

fn named(repo: &str, phase: &str) -> ClassificationResult {
    ClassificationResult::classified(slug(repo), Phase::from_label(phase), None, Vec::new())
}

fn acme() -> ResultPartition {
    ResultPartition::new(
        "acme",
        vec![
            named("acme/api", "maintained"),
            ClassificationResult::failed(slug("acme/site"), ErrorMarker::CheckoutFailed, "timeout"),
            ClassificationResult::failed(
                slug("acme/docs"),
                ErrorMarker::UnknownParseError,
                "no phase",
            ),
        ],
    )
}

fn beta() -> ResultPartition {
    ResultPartition::new(
        "beta",
        vec![
            named("beta/zeta", "spark"),
            named("beta/alpha", "spark"),
            named("beta/old", "Archive"),
        ],
    )
}

#[test]
fn test_full_render() {
    let report = aggregate(
        vec![acme()],
        vec![ShardFailure {
            organization: "broken".to_string(),
            reason: "listing\nexploded".to_string(),
        }],
        fixed_now(),
        "42",
    );

    let expected = "\
# Repository Lifecycle Report

_Generated 2025-06-01T00:00:00Z for run `42`_

## acme

3 repositories: 1 Checkout Failed, 1 Unknown, 1 maintained

| Repository | Phase |
| --- | --- |
| [site](https://github.com/acme/site) | Checkout Failed |
| [docs](https://github.com/acme/docs) | Unknown |
| [api](https://github.com/acme/api) | maintained |

## Failed organizations

- `broken`: listing exploded
";
    assert_eq!(report.render(&RenderOptions::default()), expected);
}

#[test]
fn test_organizations_sorted_and_rows_ordered() {
    let report = aggregate(vec![beta(), acme()], Vec::new(), fixed_now(), "r");

    let orgs: Vec<&str> = report.sections.iter().map(|s| s.organization.as_str()).collect();
    assert_eq!(orgs, vec!["acme", "beta"]);

    let beta_rows: Vec<String> = report.sections[1]
        .rows
        .iter()
        .map(|row| row.repo.to_string())
        .collect();
    assert_eq!(beta_rows, vec!["beta/old", "beta/alpha", "beta/zeta"]);

    let acme_rows = &report.sections[0].rows;
    assert!(acme_rows[0].error_class && acme_rows[1].error_class);
    assert!(!acme_rows[2].error_class);
}

#[test]
fn test_aggregation_is_order_independent_and_idempotent() {
    let options = RenderOptions::default();
    let first = aggregate(vec![acme(), beta()], Vec::new(), fixed_now(), "r").render(&options);
    let second = aggregate(vec![beta(), acme()], Vec::new(), fixed_now(), "r").render(&options);
    assert_eq!(first, second);

    let reversed_rows = ResultPartition::new(
        "beta",
        beta().into_results().into_iter().rev().collect(),
    );
    let third = aggregate(vec![acme(), reversed_rows], Vec::new(), fixed_now(), "r").render(&options);
    assert_eq!(first, third);
}

#[test]
fn test_empty_run_renders_no_data_notice() {
    let report = aggregate(Vec::new(), Vec::new(), fixed_now(), "r");
    assert!(report.is_empty());

    let rendered = report.render(&RenderOptions::default());
    assert!(rendered.starts_with(&format!("# {REPORT_TITLE}\n")));
    assert!(rendered.contains(NO_DATA_NOTICE));
    assert!(!rendered.contains("| Repository |"));
}

#[test]
fn test_empty_partition_is_dropped() {
    let report = aggregate(
        vec![ResultPartition::new("quiet", Vec::new()), beta()],
        Vec::new(),
        fixed_now(),
        "r",
    );
    assert_eq!(report.sections.len(), 1);
    assert_eq!(report.sections[0].organization, "beta");
}

#[test]
fn test_all_failed_shards_still_show_notice_and_failures() {
    let report = aggregate(
        Vec::new(),
        vec![
            ShardFailure {
                organization: "zeta".to_string(),
                reason: "boom".to_string(),
            },
            ShardFailure {
                organization: "alpha".to_string(),
                reason: "bang".to_string(),
            },
        ],
        fixed_now(),
        "r",
    );
    let rendered = report.render(&RenderOptions::default());
    assert!(rendered.contains(NO_DATA_NOTICE));
    let alpha = rendered.find("- `alpha`").unwrap();
    let zeta = rendered.find("- `zeta`").unwrap();
    assert!(alpha < zeta);
}

#[test]
fn test_cells_and_links_are_escaped() {
    let report = aggregate(
        vec![ResultPartition::new(
            "acme",
            vec![named("acme/pipes", "a|b")],
        )],
        Vec::new(),
        fixed_now(),
        "r",
    );
    let rendered = report.render(&RenderOptions {
        base_url: "https://git.example.com/".to_string(),
    });
    assert!(rendered.contains("| [pipes](https://git.example.com/acme/pipes) | a\\|b |"));
}

#[test]
fn test_counts_and_summary_line() {
    let report = aggregate(
        vec![acme(), beta()],
        vec![ShardFailure {
            organization: "gone".to_string(),
            reason: "listing failed".to_string(),
        }],
        fixed_now(),
        "run-7",
    );
    assert_eq!(report.repository_count(), 6);
    assert_eq!(report.error_count(), 2);
    assert_eq!(
        report.summary_line(),
        "Repository Lifecycle Report (run-7): 6 repositories across 2 organizations, 2 needing attention, 1 organizations failed"
    );

    let counts = report.sections[1].phase_counts();
    assert_eq!(counts.get("spark"), Some(&2));
    assert_eq!(counts.get("Archive"), Some(&1));
}
