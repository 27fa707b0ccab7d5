//! Commit velocity operation.

use crate::github::{error::GitHubError, util::spawn_task};
use crate::runtime::AsyncTask;
use chrono::{DateTime, Utc};
use octocrab::{Octocrab, Page, models::repos::RepoCommit};
use std::sync::Arc;

/// Count commits on the default branch authored after `since`.
pub(crate) fn count_commits_since(
    inner: Arc<Octocrab>,
    owner: impl Into<String>,
    repo: impl Into<String>,
    since: DateTime<Utc>,
    per_page: u8,
) -> AsyncTask<Result<u64, GitHubError>> {
    let owner = owner.into();
    let repo = repo.into();

    spawn_task(async move {
        let repos_handler = inner.repos(&owner, &repo);
        let mut page: Page<RepoCommit> = repos_handler
            .list_commits()
            .since(since)
            .per_page(per_page)
            .send()
            .await
            .map_err(GitHubError::from)?;

        let mut count = page.items.len() as u64;
        while let Some(next_page) = inner.get_page::<RepoCommit>(&page.next).await? {
            page = next_page;
            count += page.items.len() as u64;
        }
        Ok(count)
    })
}
