//! Latest release lookup operation.

use crate::github::{error::GitHubError, util::spawn_task};
use crate::runtime::AsyncTask;
use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use std::sync::Arc;

/// Publication time of the latest release.
///
/// `Ok(None)` means the repository has never published a release; GitHub
/// answers 404 in that case, which is not an error here.
pub(crate) fn get_latest_release_date(
    inner: Arc<Octocrab>,
    owner: impl Into<String>,
    repo: impl Into<String>,
) -> AsyncTask<Result<Option<DateTime<Utc>>, GitHubError>> {
    let owner = owner.into();
    let repo = repo.into();

    spawn_task(async move {
        match inner.repos(&owner, &repo).releases().get_latest().await {
            Ok(release) => Ok(release.published_at.or(release.created_at)),
            Err(e) => {
                let err = GitHubError::from(e);
                if err.is_not_found() {
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    })
}
