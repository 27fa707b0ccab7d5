//! Per-repository classification results and their wire format.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::classifier::Phase;
use super::metrics::{DegradedMetric, MetricVector};

/// Label prefixes that put a row in the error class of a report.
pub const ERROR_CLASS_PREFIXES: [&str; 4] =
    ["Error", "Unknown", "Checkout Failed", "Classification Error"];

/// Labels that only the pipeline itself may assign.
#[must_use]
pub fn is_reserved_label(name: &str) -> bool {
    ["Archive", "Inaccessible", "Unknown"]
        .iter()
        .chain(ERROR_CLASS_PREFIXES.iter())
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
}

/// `owner/name` identifier of a repository.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoSlug {
    owner: String,
    name: String,
}

impl RepoSlug {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoSlug {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::github::split_slug(s)
            .map(|(owner, name)| RepoSlug::new(owner, name))
            .ok_or_else(|| format!("'{s}' is not an owner/name repository slug"))
    }
}

impl TryFrom<String> for RepoSlug {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RepoSlug> for String {
    fn from(slug: RepoSlug) -> Self {
        slug.to_string()
    }
}

/// Why a repository could not be classified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorMarker {
    /// The working copy could not be materialized.
    CheckoutFailed,
    /// The classification step failed or produced nothing.
    ClassificationError,
    /// A result was produced but its phase could not be read back.
    UnknownParseError,
}

impl ErrorMarker {
    /// Machine tag used in the `error` field of a record.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            ErrorMarker::CheckoutFailed => "checkout-failed",
            ErrorMarker::ClassificationError => "classification-error",
            ErrorMarker::UnknownParseError => "unknown-parse-error",
        }
    }

    /// Phase label shown in reports.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ErrorMarker::CheckoutFailed => "Checkout Failed",
            ErrorMarker::ClassificationError => "Classification Error",
            ErrorMarker::UnknownParseError => "Unknown",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        [
            ErrorMarker::CheckoutFailed,
            ErrorMarker::ClassificationError,
            ErrorMarker::UnknownParseError,
        ]
        .into_iter()
        .find(|marker| marker.tag() == tag)
    }
}

/// Either a phase or an error marker, never both.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Classified(Phase),
    Failed { marker: ErrorMarker, detail: String },
}

/// One repository's result for one run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ResultRecord", into = "ResultRecord")]
pub struct ClassificationResult {
    repo: RepoSlug,
    outcome: Outcome,
    metrics: Option<MetricVector>,
    degraded: Vec<DegradedMetric>,
}

impl ClassificationResult {
    pub fn classified(
        repo: RepoSlug,
        phase: Phase,
        metrics: Option<MetricVector>,
        degraded: Vec<DegradedMetric>,
    ) -> Self {
        Self {
            repo,
            outcome: Outcome::Classified(phase),
            metrics,
            degraded,
        }
    }

    pub fn failed(repo: RepoSlug, marker: ErrorMarker, detail: impl Into<String>) -> Self {
        Self {
            repo,
            outcome: Outcome::Failed {
                marker,
                detail: detail.into(),
            },
            metrics: None,
            degraded: Vec::new(),
        }
    }

    #[must_use]
    pub fn repo(&self) -> &RepoSlug {
        &self.repo
    }

    #[must_use]
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    #[must_use]
    pub fn metrics(&self) -> Option<&MetricVector> {
        self.metrics.as_ref()
    }

    #[must_use]
    pub fn degraded(&self) -> &[DegradedMetric] {
        &self.degraded
    }

    #[must_use]
    pub fn phase(&self) -> Option<&Phase> {
        match &self.outcome {
            Outcome::Classified(phase) => Some(phase),
            Outcome::Failed { .. } => None,
        }
    }

    #[must_use]
    pub fn error_marker(&self) -> Option<ErrorMarker> {
        match &self.outcome {
            Outcome::Classified(_) => None,
            Outcome::Failed { marker, .. } => Some(*marker),
        }
    }

    /// Label shown in the report's Phase column.
    #[must_use]
    pub fn phase_label(&self) -> &str {
        match &self.outcome {
            Outcome::Classified(phase) => phase.label(),
            Outcome::Failed { marker, .. } => marker.label(),
        }
    }

    #[must_use]
    pub fn is_error_class(&self) -> bool {
        let label = self.phase_label();
        ERROR_CLASS_PREFIXES
            .iter()
            .any(|prefix| label.starts_with(prefix))
    }

    /// Archived and inaccessible repositories get no follow-up engagement.
    #[must_use]
    pub fn is_engageable(&self) -> bool {
        !matches!(self.phase(), Some(phase) if phase.is_terminal())
    }
}

/// Serialized record: `{repo, phase, metrics?, degraded?, error?}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResultRecord {
    pub repo: String,
    pub phase: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricVector>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<DegradedMetric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ClassificationResult> for ResultRecord {
    fn from(result: ClassificationResult) -> Self {
        let phase = result.phase_label().to_string();
        let error = match &result.outcome {
            Outcome::Classified(_) => None,
            Outcome::Failed { marker, detail } => Some(format!("{}: {detail}", marker.tag())),
        };
        ResultRecord {
            repo: result.repo.to_string(),
            phase,
            metrics: result.metrics,
            degraded: result.degraded,
            error,
        }
    }
}

impl TryFrom<ResultRecord> for ClassificationResult {
    type Error = String;

    fn try_from(record: ResultRecord) -> Result<Self, Self::Error> {
        let repo: RepoSlug = record.repo.parse()?;
        let outcome = match record.error {
            None => Outcome::Classified(Phase::from_label(&record.phase)),
            Some(error) => {
                let (tag, detail) = error.split_once(": ").unwrap_or((error.as_str(), ""));
                let marker = ErrorMarker::from_tag(tag)
                    .ok_or_else(|| format!("unknown error marker '{tag}' for {repo}"))?;
                Outcome::Failed {
                    marker,
                    detail: detail.to_string(),
                }
            }
        };
        Ok(ClassificationResult {
            repo,
            outcome,
            metrics: record.metrics,
            degraded: record.degraded,
        })
    }
}
