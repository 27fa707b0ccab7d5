//! GitHub-backed implementations of the pipeline's remote seams.

use chrono::{DateTime, Utc};

use crate::github::{GitHubClient, GitHubResult};

use super::collector::{MetricsSource, RepoMetadata};
use super::record::RepoSlug;
use super::shard::RepositoryLister;

impl MetricsSource for GitHubClient {
    async fn metadata(&self, slug: &RepoSlug) -> GitHubResult<RepoMetadata> {
        let repo = self.get_repository(slug.owner(), slug.name()).await??;
        Ok(RepoMetadata {
            created_at: repo.created_at,
            pushed_at: repo.pushed_at.or(repo.updated_at),
            archived: repo.archived.unwrap_or(false),
        })
    }

    async fn contributor_count(&self, slug: &RepoSlug) -> GitHubResult<u64> {
        self.count_contributors(slug.owner(), slug.name()).await?
    }

    async fn commit_count_since(&self, slug: &RepoSlug, since: DateTime<Utc>) -> GitHubResult<u64> {
        self.count_commits_since(slug.owner(), slug.name(), since)
            .await?
    }

    async fn latest_release(&self, slug: &RepoSlug) -> GitHubResult<Option<DateTime<Utc>>> {
        self.get_latest_release_date(slug.owner(), slug.name())
            .await?
    }
}

impl RepositoryLister for GitHubClient {
    async fn list_repositories(&self, organization: &str) -> GitHubResult<Vec<String>> {
        let repos = self
            .list_org_repositories(organization)
            .try_collect_all()
            .await?;
        Ok(repos.into_iter().map(|repo| repo.name).collect())
    }
}
