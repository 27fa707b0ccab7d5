//! Repository contributor counting operation.

use crate::github::{error::GitHubError, util::spawn_task};
use crate::runtime::AsyncTask;
use octocrab::Octocrab;
use std::sync::Arc;

/// Count the contributors of a repository across all pages.
pub(crate) fn count_contributors(
    inner: Arc<Octocrab>,
    owner: impl Into<String>,
    repo: impl Into<String>,
    per_page: u8,
) -> AsyncTask<Result<u64, GitHubError>> {
    let owner = owner.into();
    let repo = repo.into();

    spawn_task(async move {
        let first = inner
            .repos(&owner, &repo)
            .list_contributors()
            .per_page(per_page)
            .send()
            .await
            .map_err(GitHubError::from)?;

        let contributors = inner.all_pages(first).await.map_err(GitHubError::from)?;
        Ok(contributors.len() as u64)
    })
}
