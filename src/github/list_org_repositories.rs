//! Organization repository listing operation.

use crate::github::error::GitHubError;
use crate::runtime::{AsyncStream, EmitterBuilder};
use log::warn;
use octocrab::{Octocrab, Page, models::Repository};
use std::sync::Arc;

/// List every repository of an organization, walking all pages.
///
/// A failure on any page fails the whole listing: callers cannot tell which
/// repositories were left out of a partial answer.
pub(crate) fn list_org_repositories(
    inner: Arc<Octocrab>,
    org: impl Into<String>,
    per_page: u8,
) -> AsyncStream<Result<Repository, GitHubError>> {
    let org = org.into();
    let label = org.clone();

    let builder = EmitterBuilder::new(Box::new(move || {
        Box::pin(async move {
            let mut repos = Vec::new();

            let mut page: Page<Repository> = inner
                .orgs(&org)
                .list_repos()
                .per_page(per_page)
                .send()
                .await
                .map_err(GitHubError::from)?;
            repos.extend(page.items);

            while let Some(next_page) = inner.get_page::<Repository>(&page.next).await? {
                page = next_page;
                repos.extend(page.items);
            }
            Ok(repos)
        })
    }));

    builder.emit(
        |_| true,
        move |e| warn!("Failed to list repositories for {label}: {e}"),
    )
}
