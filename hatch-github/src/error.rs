//! Error types for GitHub operations

use thiserror::Error;

/// Result type for GitHub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during GitHub operations
#[derive(Error, Debug)]
pub enum Error {
    /// GitHub API error
    #[error("GitHub API error: {0}")]
    Api(#[from] octocrab::Error),

    /// Authentication error
    #[error("GitHub authentication error: {0}")]
    Auth(String),

    /// Repository not found
    #[error("Repository {0} not found")]
    RepoNotFound(String),

    /// Rate limit exceeded
    #[error("GitHub rate limit exceeded: {0}")]
    RateLimited(String),

    /// Secrets file problem
    #[error("Secrets error: {0}")]
    Secrets(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<Error> for hatch_core::Error {
    fn from(err: Error) -> Self {
        hatch_core::Error::ForkList(err.to_string())
    }
}
