//! GitHub API operations module
//!
//! The remote reads and writes the lifecycle pipeline needs, implemented on
//! top of octocrab. Each operation lives in its own module and is exposed
//! through a [`GitHubClient`] method.

pub mod client;
pub mod error;
pub mod util;

// Re-export client types
pub use client::{Credentials, GitHubClient, GitHubClientBuilder, MAX_PAGE_SIZE};

// Re-export error types
pub use error::{GitHubError, GitHubResult};
pub use util::{spawn_task, split_slug};

// Re-export request types
pub use list_issues::ListIssuesRequest;
pub use open_tracking_issue::IssueDraft;

// Issues (internal)
pub(crate) mod list_issues;
pub(crate) mod open_tracking_issue;
pub(crate) mod replace_issue_body;

// Repositories (internal)
pub(crate) mod count_commits;
pub(crate) mod count_contributors;
pub(crate) mod get_latest_release;
pub(crate) mod get_repository;

// Organizations (internal)
pub(crate) mod list_org_repositories;
