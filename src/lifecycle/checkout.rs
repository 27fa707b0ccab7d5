//! Working copy materialization ahead of classification.

use log::{debug, warn};
use std::fmt;
use std::future::Future;
use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use thiserror::Error;

use crate::runtime::AsyncTask;

use super::record::RepoSlug;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Temp dir: {0}")]
    TempDir(#[from] std::io::Error),

    #[error("Clone of {repo} failed: {reason}")]
    Clone { repo: String, reason: String },

    #[error("Clone of {repo} timed out after {after:?}")]
    Timeout { repo: String, after: Duration },
}

/// A checked-out repository. The directory is removed on drop.
#[derive(Debug, Default)]
pub struct WorkingCopy {
    dir: Option<TempDir>,
}

impl WorkingCopy {
    /// Placeholder used when checkouts are disabled.
    #[must_use]
    pub fn none() -> Self {
        Self { dir: None }
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }
}

/// Materializes a working copy of a repository.
pub trait Checkout: Send + Sync {
    fn materialize(
        &self,
        slug: &RepoSlug,
    ) -> impl Future<Output = Result<WorkingCopy, CheckoutError>> + Send;
}

/// Shallow-clones over HTTPS with gix into a temporary directory.
#[derive(Clone)]
pub struct GixCheckout {
    base_url: String,
    fetch_timeout: Duration,
    access_token: Option<String>,
}

impl fmt::Debug for GixCheckout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GixCheckout")
            .field("base_url", &self.base_url)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("authenticated", &self.access_token.is_some())
            .finish()
    }
}

impl GixCheckout {
    pub fn new(base_url: impl Into<String>, fetch_timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            fetch_timeout,
            access_token: None,
        }
    }

    /// Token sent as the HTTPS password, so private repositories the API
    /// can read can also be cloned.
    #[must_use]
    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token.filter(|t| !t.is_empty());
        self
    }

    /// Clone URL without credentials, safe to log.
    #[must_use]
    pub fn clone_url(&self, slug: &RepoSlug) -> String {
        format!("{}/{}/{}.git", self.base_url, slug.owner(), slug.name())
    }

    /// URL handed to gix; carries the token when one is configured and
    /// must not be logged.
    #[must_use]
    pub fn fetch_url(&self, slug: &RepoSlug) -> String {
        let url = self.clone_url(slug);
        match (&self.access_token, url.split_once("://")) {
            (Some(token), Some((scheme, rest))) => format!(
                "{scheme}://x-access-token:{}@{rest}",
                urlencoding::encode(token)
            ),
            _ => url,
        }
    }

    /// gix errors may echo the fetch URL.
    fn redact(&self, text: String) -> String {
        match &self.access_token {
            Some(token) => text
                .replace(urlencoding::encode(token).as_ref(), "***")
                .replace(token.as_str(), "***"),
            None => text,
        }
    }
}

type CloneError = Box<dyn std::error::Error + Send + Sync>;

fn shallow_clone(
    url: &str,
    dir: TempDir,
    interrupt: &AtomicBool,
) -> Result<TempDir, CloneError> {
    let parsed_url = gix::url::parse(url.into())?;
    let mut prep = gix::prepare_clone(parsed_url, dir.path())?.with_shallow(
        gix::remote::fetch::Shallow::DepthAtRemote(NonZeroU32::MIN),
    );
    let (mut checkout, _) = prep.fetch_then_checkout(gix::progress::Discard, interrupt)?;
    checkout.main_worktree(gix::progress::Discard, interrupt)?;
    Ok(dir)
}

impl Checkout for GixCheckout {
    async fn materialize(&self, slug: &RepoSlug) -> Result<WorkingCopy, CheckoutError> {
        let temp_dir = TempDir::new()?;
        let url = self.fetch_url(slug);
        let repo = slug.to_string();
        let interrupt = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&interrupt);

        debug!("Cloning {}", self.clone_url(slug));
        // The directory moves into the clone thread and is only dropped
        // once that thread is done with it.
        let clone = tokio::time::timeout(
            self.fetch_timeout,
            AsyncTask::spawn(move || shallow_clone(&url, temp_dir, &flag)),
        )
        .await;

        match clone {
            Err(_) => {
                interrupt.store(true, Ordering::Relaxed);
                warn!("Clone timeout for {repo} after {:?}", self.fetch_timeout);
                Err(CheckoutError::Timeout {
                    repo,
                    after: self.fetch_timeout,
                })
            }
            Ok(Err(e)) => Err(CheckoutError::Clone {
                repo,
                reason: format!("clone task died: {e}"),
            }),
            Ok(Ok(Err(e))) => Err(CheckoutError::Clone {
                repo,
                reason: self.redact(e.to_string()),
            }),
            Ok(Ok(Ok(dir))) => Ok(WorkingCopy { dir: Some(dir) }),
        }
    }
}

/// Checkout strategy selected from configuration.
#[derive(Clone, Debug)]
pub enum CheckoutStrategy {
    Clone(GixCheckout),
    Skip,
}

impl Checkout for CheckoutStrategy {
    async fn materialize(&self, slug: &RepoSlug) -> Result<WorkingCopy, CheckoutError> {
        match self {
            CheckoutStrategy::Clone(gix) => gix.materialize(slug).await,
            CheckoutStrategy::Skip => Ok(WorkingCopy::none()),
        }
    }
}
