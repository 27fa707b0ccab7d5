//! GitHub API error types

use std::time::Duration;
use thiserror::Error;

/// Error types for GitHub API operations
#[derive(Debug, Error)]
pub enum GitHubError {
    /// Octocrab library error
    #[error("Octocrab error: {0}")]
    Octocrab(#[from] octocrab::Error),

    /// Generic GitHub API error
    #[error("GitHub API error: {0}")]
    Api(String),

    /// Invalid input parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Client setup/configuration error
    #[error("Client setup failed: {0}")]
    ClientSetup(String),

    /// Remote call exceeded its deadline
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    /// The task driving the call went away before answering
    #[error("Task channel error: {0}")]
    Channel(String),
}

/// Convenience result alias for GitHub operations
pub type GitHubResult<T> = Result<T, GitHubError>;

impl GitHubError {
    /// True for 404 answers, whether raised locally or by the API.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            GitHubError::NotFound(_) => true,
            GitHubError::Octocrab(octocrab::Error::GitHub { source, .. }) => {
                source.status_code.as_u16() == 404
            }
            _ => false,
        }
    }
}

impl From<String> for GitHubError {
    fn from(s: String) -> Self {
        GitHubError::Api(s)
    }
}

impl From<&str> for GitHubError {
    fn from(s: &str) -> Self {
        GitHubError::Api(s.to_string())
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for GitHubError {
    fn from(e: tokio::sync::oneshot::error::RecvError) -> Self {
        GitHubError::Channel(e.to_string())
    }
}
