//! Repositories API methods

use super::{GitHubClient, MAX_PAGE_SIZE};
use crate::github::error::GitHubError;
use crate::runtime::AsyncTask;
use chrono::{DateTime, Utc};

impl GitHubClient {
    /// Get repository metadata
    pub fn get_repository(
        &self,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> AsyncTask<Result<octocrab::models::Repository, GitHubError>> {
        crate::github::get_repository::get_repository(self.inner.clone(), owner, repo)
    }

    /// Count contributors
    pub fn count_contributors(
        &self,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> AsyncTask<Result<u64, GitHubError>> {
        crate::github::count_contributors::count_contributors(
            self.inner.clone(),
            owner,
            repo,
            MAX_PAGE_SIZE,
        )
    }

    /// Count commits made after `since`
    pub fn count_commits_since(
        &self,
        owner: impl Into<String>,
        repo: impl Into<String>,
        since: DateTime<Utc>,
    ) -> AsyncTask<Result<u64, GitHubError>> {
        crate::github::count_commits::count_commits_since(
            self.inner.clone(),
            owner,
            repo,
            since,
            MAX_PAGE_SIZE,
        )
    }

    /// Publication date of the latest release, `None` when there is none
    pub fn get_latest_release_date(
        &self,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> AsyncTask<Result<Option<DateTime<Utc>>, GitHubError>> {
        crate::github::get_latest_release::get_latest_release_date(self.inner.clone(), owner, repo)
    }
}
