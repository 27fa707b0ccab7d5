//! Aggregated report over all partitions of a run.
//!
//! [`aggregate`] folds partitions into an immutable, sorted structure;
//! [`AggregatedReport::render`] turns it into markdown. Both are pure, so the
//! same partitions always render to the same bytes and the tracking issue is
//! not rewritten when nothing changed.

use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::fmt::Write as _;

use super::record::{ClassificationResult, RepoSlug};
use super::store::ResultPartition;

pub const REPORT_TITLE: &str = "Repository Lifecycle Report";
pub const NO_DATA_NOTICE: &str =
    "> No classification data was produced in this run. This is not the same as every repository being healthy.";

/// One table row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportRow {
    pub repo: RepoSlug,
    pub phase: String,
    pub error_class: bool,
}

impl ReportRow {
    fn sort_key(&self) -> (bool, &str, &str, &str) {
        (
            !self.error_class,
            self.phase.as_str(),
            self.repo.name(),
            self.repo.owner(),
        )
    }
}

/// Rows of one organization, error-class rows first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrganizationSection {
    pub organization: String,
    pub rows: Vec<ReportRow>,
}

impl OrganizationSection {
    /// Number of rows per phase label, alphabetical.
    #[must_use]
    pub fn phase_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            *counts.entry(row.phase.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

/// An organization whose shard produced no partition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShardFailure {
    pub organization: String,
    pub reason: String,
}

/// Grouped, sorted outcome of a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregatedReport {
    pub sections: Vec<OrganizationSection>,
    pub failed_shards: Vec<ShardFailure>,
    pub generated_at: DateTime<Utc>,
    pub run_ref: String,
}

/// Rendering knobs.
#[derive(Clone, Debug)]
pub struct RenderOptions {
    /// Prefix for repository links, e.g. `https://github.com`.
    pub base_url: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            base_url: "https://github.com".to_string(),
        }
    }
}

/// Fold partitions into a report.
///
/// Organizations come out in lexicographic order. Within one, error-class
/// rows come first, then rows sort by phase label and repository name.
/// Organizations with a partition but no records are dropped.
pub fn aggregate(
    partitions: impl IntoIterator<Item = ResultPartition>,
    failed_shards: impl IntoIterator<Item = ShardFailure>,
    generated_at: DateTime<Utc>,
    run_ref: impl Into<String>,
) -> AggregatedReport {
    let grouped: BTreeMap<String, Vec<ReportRow>> =
        partitions
            .into_iter()
            .fold(BTreeMap::new(), |mut acc, partition| {
                let organization = partition.organization().to_string();
                acc.entry(organization)
                    .or_insert_with(Vec::new)
                    .extend(partition.into_results().iter().map(row_for));
                acc
            });

    let sections = grouped
        .into_iter()
        .filter(|(_, rows)| !rows.is_empty())
        .map(|(organization, mut rows)| {
            rows.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
            OrganizationSection { organization, rows }
        })
        .collect();

    let mut failed_shards: Vec<ShardFailure> = failed_shards.into_iter().collect();
    failed_shards.sort_by(|a, b| a.organization.cmp(&b.organization));

    AggregatedReport {
        sections,
        failed_shards,
        generated_at,
        run_ref: run_ref.into(),
    }
}

fn row_for(result: &ClassificationResult) -> ReportRow {
    ReportRow {
        repo: result.repo().clone(),
        phase: result.phase_label().to_string(),
        error_class: result.is_error_class(),
    }
}

impl AggregatedReport {
    /// True when no organization contributed a single record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    #[must_use]
    pub fn repository_count(&self) -> usize {
        self.sections.iter().map(|s| s.rows.len()).sum()
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.sections
            .iter()
            .flat_map(|s| &s.rows)
            .filter(|row| row.error_class)
            .count()
    }

    /// One-line summary for chat notifications and logs.
    #[must_use]
    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "{REPORT_TITLE} ({}): {} repositories across {} organizations, {} needing attention",
            self.run_ref,
            self.repository_count(),
            self.sections.len(),
            self.error_count()
        );
        if !self.failed_shards.is_empty() {
            let _ = write!(line, ", {} organizations failed", self.failed_shards.len());
        }
        line
    }

    /// Markdown document for the tracking issue.
    #[must_use]
    pub fn render(&self, options: &RenderOptions) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# {REPORT_TITLE}");
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "_Generated {} for run `{}`_",
            self.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.run_ref
        );

        if self.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "{NO_DATA_NOTICE}");
        }

        let base = options.base_url.trim_end_matches('/');
        for section in &self.sections {
            let _ = writeln!(out);
            let _ = writeln!(out, "## {}", section.organization);
            let _ = writeln!(out);

            let counts = section
                .phase_counts()
                .into_iter()
                .map(|(phase, n)| format!("{n} {}", escape_cell(phase)))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "{} repositories: {counts}", section.rows.len());
            let _ = writeln!(out);

            let _ = writeln!(out, "| Repository | Phase |");
            let _ = writeln!(out, "| --- | --- |");
            for row in &section.rows {
                let _ = writeln!(
                    out,
                    "| [{}]({base}/{}/{}) | {} |",
                    escape_cell(row.repo.name()),
                    urlencoding::encode(row.repo.owner()),
                    urlencoding::encode(row.repo.name()),
                    escape_cell(&row.phase)
                );
            }
        }

        if !self.failed_shards.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "## Failed organizations");
            let _ = writeln!(out);
            for failure in &self.failed_shards {
                let _ = writeln!(
                    out,
                    "- `{}`: {}",
                    failure.organization,
                    single_line(&failure.reason)
                );
            }
        }

        out
    }
}

fn escape_cell(text: &str) -> String {
    single_line(text).replace('|', "\\|")
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
