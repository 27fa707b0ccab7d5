//! Phase selection over a metric vector.

use std::fmt;

use super::catalog::PhaseCatalog;
use super::metrics::MetricVector;

/// Lifecycle phase assigned to a repository.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// A phase from the catalog.
    Named(String),
    /// The repository is archived. Terminal.
    Archive,
    /// Repository metadata could not be read. Terminal.
    Inaccessible,
    /// Metrics were collected but no catalog rule matched.
    Unknown,
}

impl Phase {
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Phase::Named(name) => name,
            Phase::Archive => "Archive",
            Phase::Inaccessible => "Inaccessible",
            Phase::Unknown => "Unknown",
        }
    }

    /// Inverse of [`Phase::label`].
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label {
            "Archive" => Phase::Archive,
            "Inaccessible" => Phase::Inaccessible,
            "Unknown" => Phase::Unknown,
            other => Phase::Named(other.to_string()),
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Archive | Phase::Inaccessible)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Select the phase for `vector`.
///
/// Unreachable and archived repositories resolve to their terminal phase
/// whatever else the vector holds. Otherwise the first catalog rule whose
/// constraints all hold wins; catalog order is the only tie-break.
#[must_use]
pub fn classify(vector: &MetricVector, catalog: &PhaseCatalog) -> Phase {
    if vector.reachable == Some(false) {
        return Phase::Inaccessible;
    }
    if vector.archived == Some(true) {
        return Phase::Archive;
    }
    catalog
        .rules()
        .iter()
        .find(|rule| rule.matches(vector))
        .map_or(Phase::Unknown, |rule| Phase::Named(rule.name().to_string()))
}
