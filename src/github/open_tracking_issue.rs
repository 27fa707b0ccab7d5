//! Tracking issue creation.

use crate::github::{error::GitHubError, util::spawn_task};
use crate::runtime::AsyncTask;
use log::info;
use octocrab::Octocrab;
use std::sync::Arc;

/// A new issue carrying a single label.
#[derive(Debug, Clone)]
pub struct IssueDraft {
    pub owner: String,
    pub repo: String,
    pub title: String,
    pub body: String,
    pub label: String,
}

/// Open `draft` and return the new issue number.
pub(crate) fn open_tracking_issue(
    inner: Arc<Octocrab>,
    draft: IssueDraft,
) -> AsyncTask<Result<u64, GitHubError>> {
    spawn_task(async move {
        let issue = inner
            .issues(&draft.owner, &draft.repo)
            .create(&draft.title)
            .body(&draft.body)
            .labels(vec![draft.label.clone()])
            .send()
            .await?;
        info!(
            "Opened issue #{} '{}' in {}/{}",
            issue.number, draft.title, draft.owner, draft.repo
        );
        Ok(issue.number)
    })
}
