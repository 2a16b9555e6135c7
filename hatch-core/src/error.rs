//! Error types for egg-hatcher

use thiserror::Error;

/// Result type alias for egg-hatcher operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for egg-hatcher operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The caller asked for a ref that cannot be valid (empty name, bad characters)
    #[error("Invalid ref: {0}")]
    InvalidRef(String),

    /// Initial clone of the upstream failed
    #[error("Clone failed: {0}")]
    Clone(String),

    /// Fetching a remote into the mirror failed
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// The mirror root could not be opened at all
    #[error("Mirror unavailable: {0}")]
    MirrorUnavailable(String),

    /// Resolving, creating or listing a remote failed
    #[error("Remote error: {0}")]
    Remote(String),

    /// Copying the mirror into a workspace failed
    #[error("Copy failed: {0}")]
    Copy(String),

    /// Checking out the requested ref failed
    #[error("Checkout failed: {0}")]
    Checkout(String),

    /// The build command could not be started
    #[error("Failed to launch build: {0}")]
    BuildLaunch(String),

    /// The build command exited unsuccessfully
    #[error("Build failed (exit code {}): {stderr_tail}", exit_code(code))]
    Build {
        /// Exit code, if the process exited normally
        code: Option<i32>,
        /// Last lines of the build's stderr
        stderr_tail: String,
    },

    /// An operation exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Reading the produced artifact failed
    #[error("Artifact error: {0}")]
    Artifact(String),

    /// Enumerating forks failed
    #[error("Fork listing failed: {0}")]
    ForkList(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

fn exit_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

impl Error {
    /// Whether this error was caused by the caller rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidRef(_))
    }
}
