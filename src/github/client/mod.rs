//! GitHub API client
//!
//! Keeps Octocrab out of the lifecycle pipeline: the pipeline talks to
//! [`GitHubClient`] methods, each of which spawns one remote operation.
//!
//! # Examples
//!
//! ```rust,no_run
//! use phasewatch::GitHubClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gh = GitHubClient::with_token("ghp_...")?;
//!     let repo = gh.get_repository("rust-lang", "rust").await??;
//!     println!("archived: {:?}", repo.archived);
//!     let contributors = gh.count_contributors("rust-lang", "rust").await??;
//!     println!("contributors: {contributors}");
//!     Ok(())
//! }
//! ```

use crate::github::error::{GitHubError, GitHubResult};
use jsonwebtoken::EncodingKey;
use octocrab::{Octocrab, models::AppId};
use std::sync::Arc;

mod issues;
mod organizations;
mod repositories;

/// Page size used for every listing call (GitHub API maximum).
pub const MAX_PAGE_SIZE: u8 = 100;

/// How the client authenticates.
#[derive(Clone, Default)]
pub enum Credentials {
    /// Personal access token or workflow token.
    Token(String),
    /// GitHub App JWT signed with the app's PEM private key.
    App { app_id: AppId, private_key: String },
    /// No authentication; public data under the anonymous rate limit.
    #[default]
    Anonymous,
}

impl Credentials {
    /// Short description safe to log.
    #[must_use]
    pub fn describe(&self) -> &'static str {
        match self {
            Credentials::Token(_) => "token",
            Credentials::App { .. } => "github-app",
            Credentials::Anonymous => "anonymous",
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.describe())
    }
}

/// Remote access for the lifecycle pipeline, backed by one Octocrab instance.
///
/// Cloning is cheap (Arc clone); shards share a single client.
#[derive(Clone, Debug)]
pub struct GitHubClient {
    inner: Arc<Octocrab>,
}

impl GitHubClient {
    #[must_use]
    pub fn builder() -> GitHubClientBuilder {
        GitHubClientBuilder::default()
    }

    /// Token-authenticated client against github.com
    pub fn with_token(token: impl Into<String>) -> GitHubResult<Self> {
        Self::builder()
            .credentials(Credentials::Token(token.into()))
            .build()
    }

    #[must_use]
    pub fn inner(&self) -> &Arc<Octocrab> {
        &self.inner
    }
}

/// Builder selecting credentials and, for GitHub Enterprise, the API root.
#[derive(Debug, Default)]
pub struct GitHubClientBuilder {
    credentials: Credentials,
    base_uri: Option<String>,
}

impl GitHubClientBuilder {
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// API root, e.g. `https://ghe.example.com/api/v3`
    #[must_use]
    pub fn base_uri(mut self, uri: impl Into<String>) -> Self {
        self.base_uri = Some(uri.into());
        self
    }

    pub fn build(self) -> GitHubResult<GitHubClient> {
        let mut builder = Octocrab::builder();

        builder = match self.credentials {
            Credentials::Token(token) => builder.personal_token(token),
            Credentials::App {
                app_id,
                private_key,
            } => {
                let key = EncodingKey::from_rsa_pem(private_key.as_bytes())
                    .map_err(|e| GitHubError::ClientSetup(format!("Invalid RSA key: {e}")))?;
                builder.app(app_id, key)
            }
            Credentials::Anonymous => builder,
        };

        if let Some(uri) = &self.base_uri {
            builder = builder
                .base_uri(uri.as_str())
                .map_err(|e| GitHubError::ClientSetup(format!("Invalid API base URI {uri}: {e}")))?;
        }

        let octocrab = builder
            .build()
            .map_err(|e| GitHubError::ClientSetup(e.to_string()))?;

        Ok(GitHubClient {
            inner: Arc::new(octocrab),
        })
    }
}
