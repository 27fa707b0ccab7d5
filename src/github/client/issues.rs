//! Issues API methods

use super::{GitHubClient, MAX_PAGE_SIZE};
use crate::github::error::GitHubError;
use crate::github::{IssueDraft, ListIssuesRequest};
use crate::runtime::{AsyncStream, AsyncTask};
use octocrab::models::issues::Issue;

impl GitHubClient {
    /// Open a new labelled issue, yielding its number
    pub fn open_tracking_issue(&self, draft: IssueDraft) -> AsyncTask<Result<u64, GitHubError>> {
        crate::github::open_tracking_issue::open_tracking_issue(self.inner.clone(), draft)
    }

    /// List open issues with filters
    #[must_use]
    pub fn list_issues(&self, request: ListIssuesRequest) -> AsyncStream<Result<Issue, GitHubError>> {
        crate::github::list_issues::list_issues(self.inner.clone(), request)
    }

    /// Open issues carrying `label` and titled exactly `title`
    pub fn find_open_issues_by_title(
        &self,
        owner: impl Into<String>,
        repo: impl Into<String>,
        title: impl Into<String>,
        label: impl Into<String>,
    ) -> AsyncStream<Result<Issue, GitHubError>> {
        self.list_issues(ListIssuesRequest {
            owner: owner.into(),
            repo: repo.into(),
            labels: vec![label.into()],
            title: Some(title.into()),
            per_page: MAX_PAGE_SIZE,
        })
    }

    /// Replace the body of an existing issue
    pub fn replace_issue_body(
        &self,
        owner: impl Into<String>,
        repo: impl Into<String>,
        number: u64,
        body: impl Into<String>,
    ) -> AsyncTask<Result<u64, GitHubError>> {
        crate::github::replace_issue_body::replace_issue_body(
            self.inner.clone(),
            owner.into(),
            repo.into(),
            number,
            body.into(),
        )
    }
}
