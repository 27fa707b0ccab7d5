//! GitHub repository metadata retrieval operation.

use crate::github::{error::GitHubError, util::spawn_task};
use crate::runtime::AsyncTask;
use octocrab::{Octocrab, models::Repository};
use std::sync::Arc;

/// Fetch repository metadata (`GET /repos/{owner}/{repo}`).
pub(crate) fn get_repository(
    inner: Arc<Octocrab>,
    owner: impl Into<String>,
    repo: impl Into<String>,
) -> AsyncTask<Result<Repository, GitHubError>> {
    let owner = owner.into();
    let repo = repo.into();

    spawn_task(async move {
        inner
            .repos(&owner, &repo)
            .get()
            .await
            .map_err(GitHubError::from)
    })
}
