//! Organizations API methods

use super::{GitHubClient, MAX_PAGE_SIZE};
use crate::github::error::GitHubError;
use crate::runtime::AsyncStream;

impl GitHubClient {
    /// List all repositories of an organization
    pub fn list_org_repositories(
        &self,
        org: impl Into<String>,
    ) -> AsyncStream<Result<octocrab::models::Repository, GitHubError>> {
        crate::github::list_org_repositories::list_org_repositories(
            self.inner.clone(),
            org,
            MAX_PAGE_SIZE,
        )
    }
}
