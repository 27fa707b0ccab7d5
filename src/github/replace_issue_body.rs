//! In-place body replacement for an existing issue.

use crate::github::{error::GitHubError, util::spawn_task};
use crate::runtime::AsyncTask;
use octocrab::Octocrab;
use std::sync::Arc;

/// Overwrite the body of issue `number`; title, labels and state are kept.
pub(crate) fn replace_issue_body(
    inner: Arc<Octocrab>,
    owner: String,
    repo: String,
    number: u64,
    body: String,
) -> AsyncTask<Result<u64, GitHubError>> {
    spawn_task(async move {
        let issue = inner
            .issues(&owner, &repo)
            .update(number)
            .body(&body)
            .send()
            .await?;
        Ok(issue.number)
    })
}
