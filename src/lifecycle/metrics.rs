//! Metric vector observed for one repository.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Names of the metrics a phase rule may constrain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricField {
    AgeYears,
    SilentDays,
    Contributors,
    Commits90d,
    LastReleaseDays,
    HasRelease,
    Archived,
    Reachable,
}

/// Whether a metric compares against numeric bounds or a boolean.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricKind {
    Numeric,
    Boolean,
}

impl MetricField {
    pub const ALL: [MetricField; 8] = [
        MetricField::AgeYears,
        MetricField::SilentDays,
        MetricField::Contributors,
        MetricField::Commits90d,
        MetricField::LastReleaseDays,
        MetricField::HasRelease,
        MetricField::Archived,
        MetricField::Reachable,
    ];

    /// Name used in configuration files and result records.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            MetricField::AgeYears => "ageYears",
            MetricField::SilentDays => "silentDays",
            MetricField::Contributors => "contributors",
            MetricField::Commits90d => "commits90d",
            MetricField::LastReleaseDays => "lastReleaseDays",
            MetricField::HasRelease => "hasRelease",
            MetricField::Archived => "archived",
            MetricField::Reachable => "reachable",
        }
    }

    #[must_use]
    pub fn kind(self) -> MetricKind {
        match self {
            MetricField::HasRelease | MetricField::Archived | MetricField::Reachable => {
                MetricKind::Boolean
            }
            _ => MetricKind::Numeric,
        }
    }
}

impl fmt::Display for MetricField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MetricField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricField::ALL
            .into_iter()
            .find(|field| field.name() == s)
            .ok_or_else(|| format!("unknown metric '{s}'"))
    }
}

/// A single metric reading.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MetricValue {
    Number(f64),
    Flag(bool),
}

/// Fixed-schema metric vector.
///
/// Every field is optional so that an absent reading stays distinguishable
/// from a real one: rules constraining an absent field never match. The
/// collector fills every field; partial vectors only come from hand-built
/// values or decoded records.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricVector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_years: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub silent_days: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contributors: Option<u64>,
    #[serde(default, rename = "commits90d", skip_serializing_if = "Option::is_none")]
    pub commits_90d: Option<u64>,
    /// `f64::INFINITY` when no release exists; encoded as JSON `null`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_release_days: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_release: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reachable: Option<bool>,
}

impl MetricVector {
    /// Reading for `field`, `None` when absent.
    #[must_use]
    pub fn get(&self, field: MetricField) -> Option<MetricValue> {
        match field {
            MetricField::AgeYears => self.age_years.map(MetricValue::Number),
            MetricField::SilentDays => self.silent_days.map(MetricValue::Number),
            MetricField::Contributors => self.contributors.map(|v| MetricValue::Number(v as f64)),
            MetricField::Commits90d => self.commits_90d.map(|v| MetricValue::Number(v as f64)),
            MetricField::LastReleaseDays => self.last_release_days.map(MetricValue::Number),
            MetricField::HasRelease => self.has_release.map(MetricValue::Flag),
            MetricField::Archived => self.archived.map(MetricValue::Flag),
            MetricField::Reachable => self.reachable.map(MetricValue::Flag),
        }
    }
}

/// Outcome of one sub-metric query.
#[derive(Clone, Debug, PartialEq)]
pub enum Probe<T> {
    Observed(T),
    Degraded { fallback: T, cause: String },
}

impl<T> Probe<T> {
    /// Keep the value of a successful query, fall back otherwise.
    pub fn from_result<E: fmt::Display>(result: Result<T, E>, fallback: T) -> Self {
        match result {
            Ok(value) => Probe::Observed(value),
            Err(e) => Probe::Degraded {
                fallback,
                cause: e.to_string(),
            },
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Probe::Observed(value) | Probe::Degraded { fallback: value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Probe::Observed(value) | Probe::Degraded { fallback: value, .. } => value,
        }
    }

    /// Provenance entry for `fields` when this probe fell back.
    pub fn degradations(&self, fields: &[MetricField]) -> Vec<DegradedMetric> {
        match self {
            Probe::Observed(_) => Vec::new(),
            Probe::Degraded { cause, .. } => fields
                .iter()
                .map(|&field| DegradedMetric {
                    field,
                    cause: cause.clone(),
                })
                .collect(),
        }
    }
}

/// A metric that carries its documented default instead of a real reading.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradedMetric {
    pub field: MetricField,
    pub cause: String,
}
