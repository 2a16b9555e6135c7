//! GitHub API client using octocrab

use octocrab::Octocrab;
use tracing::info;

use crate::token::Secrets;
use crate::{Error, Result};

/// GitHub API client
///
/// Unlike most GitHub tooling this works without a token; listing forks of a
/// public repository only needs read access.
pub struct GitHubClient {
    client: Octocrab,
    authenticated: bool,
}

impl GitHubClient {
    /// Create a client with the token from `GITHUB_TOKEN` or the secrets file, if any
    pub fn new() -> Result<Self> {
        let secrets = Secrets::load()?;
        Self::with_token(secrets.github_token())
    }

    /// Create a client with an explicit token, or an anonymous one for `None`
    pub fn with_token(token: Option<String>) -> Result<Self> {
        let builder = Octocrab::builder();
        let authenticated = token.is_some();
        let client = match token {
            Some(token) => builder.personal_token(token).build(),
            None => builder.build(),
        }
        .map_err(|e| Error::Auth(format!("Failed to create GitHub client: {}", e)))?;

        info!(authenticated, "Created GitHub client");

        Ok(Self {
            client,
            authenticated,
        })
    }

    /// Whether requests carry a token
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Get the underlying octocrab client
    pub fn client(&self) -> &Octocrab {
        &self.client
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("authenticated", &self.authenticated)
            .finish_non_exhaustive()
    }
}
