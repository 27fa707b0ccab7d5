//! Tracking issue and chat notification delivery.

use log::{error, info};
use serde::Serialize;
use std::future::Future;
use thiserror::Error;

use crate::github::{GitHubClient, GitHubError, GitHubResult, IssueDraft};

use super::record::RepoSlug;
use super::report::AggregatedReport;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Tracking issue update failed: {0}")]
    GitHub(#[from] GitHubError),

    #[error("Notification failed: {0}")]
    Notify(#[from] reqwest::Error),

    #[error("Notification rejected with status {0}")]
    NotifyStatus(u16),
}

/// Minimal issue operations the publisher relies on.
pub trait IssueTracker: Send + Sync {
    /// Number of the first open issue titled exactly `title` and carrying `label`.
    fn find_open_issue(
        &self,
        repo: &RepoSlug,
        title: &str,
        label: &str,
    ) -> impl Future<Output = GitHubResult<Option<u64>>> + Send;

    fn create_issue(
        &self,
        repo: &RepoSlug,
        title: &str,
        body: &str,
        label: &str,
    ) -> impl Future<Output = GitHubResult<u64>> + Send;

    fn update_issue_body(
        &self,
        repo: &RepoSlug,
        number: u64,
        body: &str,
    ) -> impl Future<Output = GitHubResult<()>> + Send;
}

impl IssueTracker for GitHubClient {
    async fn find_open_issue(
        &self,
        repo: &RepoSlug,
        title: &str,
        label: &str,
    ) -> GitHubResult<Option<u64>> {
        let matches = self
            .find_open_issues_by_title(repo.owner(), repo.name(), title, label)
            .try_collect_all()
            .await?;
        Ok(matches.iter().map(|issue| issue.number).min())
    }

    async fn create_issue(
        &self,
        repo: &RepoSlug,
        title: &str,
        body: &str,
        label: &str,
    ) -> GitHubResult<u64> {
        self.open_tracking_issue(IssueDraft {
            owner: repo.owner().to_string(),
            repo: repo.name().to_string(),
            title: title.to_string(),
            body: body.to_string(),
            label: label.to_string(),
        })
        .await?
    }

    async fn update_issue_body(&self, repo: &RepoSlug, number: u64, body: &str) -> GitHubResult<()> {
        self.replace_issue_body(repo.owner(), repo.name(), number, body)
            .await??;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    Created(u64),
    Updated(u64),
}

/// Creates or updates the single tracking issue, found by title and label.
pub struct IssuePublisher<T> {
    tracker: T,
    repo: RepoSlug,
    title: String,
    label: String,
}

impl<T: IssueTracker> IssuePublisher<T> {
    pub fn new(tracker: T, repo: RepoSlug, title: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            tracker,
            repo,
            title: title.into(),
            label: label.into(),
        }
    }

    pub async fn publish(&self, body: &str) -> Result<PublishOutcome, PublishError> {
        let existing = self
            .tracker
            .find_open_issue(&self.repo, &self.title, &self.label)
            .await?;

        let outcome = match existing {
            Some(number) => {
                self.tracker
                    .update_issue_body(&self.repo, number, body)
                    .await?;
                PublishOutcome::Updated(number)
            }
            None => {
                let number = self
                    .tracker
                    .create_issue(&self.repo, &self.title, body, &self.label)
                    .await?;
                PublishOutcome::Created(number)
            }
        };
        info!("Tracking issue {}: {outcome:?}", self.repo);
        Ok(outcome)
    }
}

#[derive(Serialize)]
struct WebhookMessage<'a> {
    text: &'a str,
}

/// Posts the report summary line to a Slack-compatible incoming webhook.
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub async fn notify(&self, report: &AggregatedReport) -> Result<(), PublishError> {
        let text = report.summary_line();
        let response = self
            .http
            .post(&self.url)
            .json(&WebhookMessage { text: &text })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PublishError::NotifyStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Publish `body` and send the notification, attempting both.
///
/// When both fail the publish error is returned and the notification error
/// is logged.
pub async fn deliver<T: IssueTracker>(
    publisher: Option<&IssuePublisher<T>>,
    notifier: Option<&WebhookNotifier>,
    report: &AggregatedReport,
    body: &str,
) -> Result<Option<PublishOutcome>, PublishError> {
    let published = match publisher {
        Some(publisher) => publisher.publish(body).await.map(Some),
        None => Ok(None),
    };
    let notified = match notifier {
        Some(notifier) => notifier.notify(report).await,
        None => Ok(()),
    };
    if let (Err(_), Err(e)) = (&published, &notified) {
        error!("{e}");
    }
    let outcome = published?;
    notified?;
    Ok(outcome)
}
