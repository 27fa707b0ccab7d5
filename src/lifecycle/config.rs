//! Run configuration loaded from TOML.
//!
//! ```toml
//! organizations = ["acme", "acme-labs"]
//! phases = "phases.yaml"
//! results_dir = "results"
//!
//! [tracking_issue]
//! repository = "acme/ospo"
//! title = "Repository Lifecycle Report"
//! label = "lifecycle-report"
//!
//! [limits]
//! shard_concurrency = 4
//! api_timeout_secs = 30
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::record::RepoSlug;
use super::report::REPORT_TITLE;
use super::shard::DEFAULT_ARCHIVED_MARKER;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Invalid(String),
}

/// Top-level run configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Organizations covered by a review run.
    pub organizations: Vec<String>,
    /// Phase catalog file, relative to the config file.
    pub phases: PathBuf,
    /// Directory receiving one subdirectory of partitions per run.
    pub results_dir: PathBuf,
    /// Web base URL used for repository links and clone URLs.
    pub web_base_url: String,
    /// Regex for repository names skipped as archived; empty disables.
    pub archived_marker: String,
    pub github: GitHubSettings,
    pub tracking_issue: Option<TrackingIssueSettings>,
    pub limits: Limits,
    pub checkout: CheckoutSettings,
    pub notify: Option<NotifySettings>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            organizations: Vec::new(),
            phases: PathBuf::from("phases.yaml"),
            results_dir: PathBuf::from("results"),
            web_base_url: "https://github.com".to_string(),
            archived_marker: DEFAULT_ARCHIVED_MARKER.to_string(),
            github: GitHubSettings::default(),
            tracking_issue: None,
            limits: Limits::default(),
            checkout: CheckoutSettings::default(),
            notify: None,
        }
    }
}

/// API endpoint and GitHub App credentials. Tokens come from the
/// environment, never from this file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GitHubSettings {
    pub api_base_uri: Option<String>,
    pub app_id: Option<u64>,
    pub private_key_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackingIssueSettings {
    /// `owner/name` of the repository holding the tracking issue.
    pub repository: String,
    #[serde(default = "default_issue_title")]
    pub title: String,
    #[serde(default = "default_issue_label")]
    pub label: String,
}

fn default_issue_title() -> String {
    REPORT_TITLE.to_string()
}

fn default_issue_label() -> String {
    "lifecycle-report".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Limits {
    pub shard_concurrency: usize,
    pub repo_concurrency: usize,
    pub api_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            shard_concurrency: 4,
            repo_concurrency: 1,
            api_timeout_secs: 30,
            fetch_timeout_secs: 300,
        }
    }
}

impl Limits {
    #[must_use]
    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckoutSettings {
    pub enabled: bool,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotifySettings {
    pub webhook_url: String,
}

impl RunConfig {
    /// Load and validate `path`. A relative `phases` path is resolved
    /// against the config file's directory.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if config.phases.is_relative()
            && let Some(dir) = path.parent()
        {
            config.phases = dir.join(&config.phases);
        }
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.shard_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "limits.shard_concurrency must be at least 1".to_string(),
            ));
        }
        if let Some(issue) = &self.tracking_issue {
            issue
                .repository
                .parse::<RepoSlug>()
                .map_err(|e| ConfigError::Invalid(format!("tracking_issue.repository: {e}")))?;
        }
        if self.github.app_id.is_some() != self.github.private_key_path.is_some() {
            return Err(ConfigError::Invalid(
                "github.app_id and github.private_key_path must be set together".to_string(),
            ));
        }
        Ok(())
    }
}
