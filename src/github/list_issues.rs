//! GitHub Issues listing operation.

use crate::github::error::GitHubError;
use crate::runtime::{AsyncStream, EmitterBuilder};
use octocrab::models::issues::Issue;
use octocrab::{Octocrab, Page, params};
use std::sync::Arc;

/// Request parameters for listing open issues
#[derive(Debug, Clone)]
pub struct ListIssuesRequest {
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Only issues carrying all of these labels
    pub labels: Vec<String>,
    /// Only issues whose title is exactly this string
    pub title: Option<String>,
    /// Results per page (max 100)
    pub per_page: u8,
}

/// List open issues, optionally narrowed to one exact title.
///
/// Pull requests come back from the issues endpoint too; they are dropped.
pub(crate) fn list_issues(
    inner: Arc<Octocrab>,
    request: ListIssuesRequest,
) -> AsyncStream<Result<Issue, GitHubError>> {
    let title = request.title.clone();

    let builder = EmitterBuilder::new(Box::new(move || {
        Box::pin(async move {
            let mut issues = Vec::new();
            let issues_handler = inner.issues(&request.owner, &request.repo);
            let mut req = issues_handler
                .list()
                .state(params::State::Open)
                .per_page(request.per_page);
            if !request.labels.is_empty() {
                req = req.labels(&request.labels);
            }

            let mut page_res: Page<Issue> = req.send().await.map_err(GitHubError::from)?;
            issues.extend(page_res.items);

            while let Some(next_page) = inner.get_page::<Issue>(&page_res.next).await? {
                page_res = next_page;
                issues.extend(page_res.items);
            }
            Ok(issues)
        })
    }));

    builder.emit(
        move |issue: &Issue| {
            issue.pull_request.is_none() && title.as_ref().is_none_or(|t| &issue.title == t)
        },
        |_| {},
    )
}
