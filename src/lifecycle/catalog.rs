//! Phase catalog: ordered phase rules loaded from configuration.
//!
//! Rules are evaluated in the order they are declared and the first match
//! wins, so the order of a catalog file is part of its meaning. Preferred
//! layout:
//!
//! ```yaml
//! phases:
//!   - name: spark
//!     rules:
//!       contributors: { max: 2 }
//!       hasRelease: false
//!   - name: incubation
//!     rules:
//!       contributors: { min: 3 }
//! ```
//!
//! The older mapping layout (`phases: { spark: { contributors: {max: 2} } }`)
//! is accepted too; entries keep their document order.

use log::debug;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;

use super::metrics::{MetricField, MetricKind, MetricValue, MetricVector};
use super::record::is_reserved_label;

/// Rule names handled before the catalog is consulted.
pub const TERMINAL_RULE_NAMES: [&str; 2] = ["archived", "inaccessible"];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read phase catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed phase catalog: {0}")]
    Syntax(#[from] serde_yaml::Error),

    #[error("Phase catalog must contain a 'phases' sequence or mapping")]
    MissingPhases,

    #[error("Phase '{phase}': {reason}")]
    InvalidRule { phase: String, reason: String },

    #[error("Phase '{0}' is declared more than once")]
    DuplicatePhase(String),

    #[error("Phase name '{0}' is reserved")]
    ReservedName(String),
}

/// A single field constraint. Bounds are inclusive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Constraint {
    MinBound(f64),
    MaxBound(f64),
    BooleanEquals(bool),
}

impl Constraint {
    /// Whether `value` satisfies the constraint. An absent value never does.
    #[must_use]
    pub fn holds(self, value: Option<MetricValue>) -> bool {
        match (self, value) {
            (Constraint::MinBound(min), Some(MetricValue::Number(v))) => v >= min,
            (Constraint::MaxBound(max), Some(MetricValue::Number(v))) => v <= max,
            (Constraint::BooleanEquals(expected), Some(MetricValue::Flag(v))) => v == expected,
            _ => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldConstraint {
    pub field: MetricField,
    pub constraint: Constraint,
}

/// A named conjunction of field constraints.
#[derive(Clone, Debug, PartialEq)]
pub struct PhaseRule {
    name: String,
    constraints: Vec<FieldConstraint>,
}

impl PhaseRule {
    pub fn new(name: impl Into<String>, constraints: Vec<FieldConstraint>) -> Self {
        Self {
            name: name.into(),
            constraints,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn constraints(&self) -> &[FieldConstraint] {
        &self.constraints
    }

    /// True when every declared constraint holds for `vector`.
    #[must_use]
    pub fn matches(&self, vector: &MetricVector) -> bool {
        self.constraints
            .iter()
            .all(|fc| fc.constraint.holds(vector.get(fc.field)))
    }
}

/// Ordered list of phase rules. Cheap to share behind an `Arc`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PhaseCatalog {
    rules: Vec<PhaseRule>,
}

impl PhaseCatalog {
    /// Build a catalog from rules in priority order.
    pub fn new(rules: Vec<PhaseRule>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for rule in &rules {
            if is_reserved_label(&rule.name) || is_terminal_name(&rule.name) {
                return Err(CatalogError::ReservedName(rule.name.clone()));
            }
            if !seen.insert(rule.name.as_str()) {
                return Err(CatalogError::DuplicatePhase(rule.name.clone()));
            }
        }
        Ok(Self { rules })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Parse YAML (or JSON) catalog text.
    pub fn from_yaml_str(text: &str) -> Result<Self, CatalogError> {
        let doc: serde_yaml::Value = serde_yaml::from_str(text)?;
        let phases = doc.get("phases").ok_or(CatalogError::MissingPhases)?;

        let entries: Vec<(String, BTreeMap<String, RawConstraint>)> = match phases {
            serde_yaml::Value::Sequence(items) => items
                .iter()
                .map(|item| {
                    let raw: RawPhase = serde_yaml::from_value(item.clone())?;
                    Ok((raw.name, raw.rules))
                })
                .collect::<Result<_, CatalogError>>()?,
            serde_yaml::Value::Mapping(map) => map
                .iter()
                .map(|(key, value)| {
                    let name = key
                        .as_str()
                        .ok_or_else(|| CatalogError::InvalidRule {
                            phase: format!("{key:?}"),
                            reason: "phase names must be strings".to_string(),
                        })?
                        .to_string();
                    let rules = if value.is_null() {
                        BTreeMap::new()
                    } else {
                        serde_yaml::from_value(value.clone())?
                    };
                    Ok((name, rules))
                })
                .collect::<Result<_, CatalogError>>()?,
            _ => return Err(CatalogError::MissingPhases),
        };

        let mut rules = Vec::with_capacity(entries.len());
        for (name, raw_rules) in entries {
            if is_terminal_name(&name) {
                debug!("Phase catalog entry '{name}' is a built-in terminal phase; skipping");
                continue;
            }
            rules.push(build_rule(name, raw_rules)?);
        }
        Self::new(rules)
    }

    #[must_use]
    pub fn rules(&self) -> &[PhaseRule] {
        &self.rules
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn is_terminal_name(name: &str) -> bool {
    TERMINAL_RULE_NAMES
        .iter()
        .any(|terminal| terminal.eq_ignore_ascii_case(name))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPhase {
    name: String,
    #[serde(default)]
    rules: BTreeMap<String, RawConstraint>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawConstraint {
    Exact(bool),
    Bounds(RawBounds),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBounds {
    min: Option<f64>,
    max: Option<f64>,
}

fn build_rule(
    name: String,
    raw_rules: BTreeMap<String, RawConstraint>,
) -> Result<PhaseRule, CatalogError> {
    let invalid = |reason: String| CatalogError::InvalidRule {
        phase: name.clone(),
        reason,
    };

    let mut constraints = Vec::new();
    for (key, raw) in raw_rules {
        let field: MetricField = key.parse().map_err(invalid)?;
        match (field.kind(), raw) {
            (MetricKind::Boolean, RawConstraint::Exact(expected)) => {
                constraints.push(FieldConstraint {
                    field,
                    constraint: Constraint::BooleanEquals(expected),
                });
            }
            (MetricKind::Numeric, RawConstraint::Bounds(RawBounds { min, max })) => {
                if min.is_none() && max.is_none() {
                    return Err(invalid(format!("'{field}' declares neither min nor max")));
                }
                if let (Some(lo), Some(hi)) = (min, max)
                    && lo > hi
                {
                    return Err(invalid(format!("'{field}' has min {lo} above max {hi}")));
                }
                if let Some(lo) = min {
                    constraints.push(FieldConstraint {
                        field,
                        constraint: Constraint::MinBound(lo),
                    });
                }
                if let Some(hi) = max {
                    constraints.push(FieldConstraint {
                        field,
                        constraint: Constraint::MaxBound(hi),
                    });
                }
            }
            (MetricKind::Boolean, RawConstraint::Bounds(_)) => {
                return Err(invalid(format!("'{field}' is boolean and takes true or false")));
            }
            (MetricKind::Numeric, RawConstraint::Exact(_)) => {
                return Err(invalid(format!("'{field}' is numeric and takes min/max bounds")));
            }
        }
    }
    Ok(PhaseRule::new(name, constraints))
}
