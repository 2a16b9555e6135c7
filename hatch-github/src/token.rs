//! GitHub token loading
//!
//! The token lives apart from the service configuration, in
//! `~/.config/egg-hatcher/secrets.toml`, which must not be readable by group
//! or others (0600 on Unix). `GITHUB_TOKEN` takes precedence over the file.
//! Having no token at all is allowed; requests then go out unauthenticated
//! under GitHub's lower rate limit.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::{Error, Result};

/// Environment variable checked before the secrets file
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Contents of the secrets file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Secrets {
    pub github: GitHubSecrets,
}

/// GitHub-related secrets
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GitHubSecrets {
    /// Personal access token
    pub token: Option<String>,
}

impl Secrets {
    /// Load secrets from the default location, or empty secrets if there is no file
    pub fn load() -> Result<Self> {
        match Self::default_secrets_path() {
            Some(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load secrets from a specific file with permission checking
    pub fn load_from_file(path: &Path) -> Result<Self> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mode = std::fs::metadata(path)?.permissions().mode();
            if mode & 0o077 != 0 {
                return Err(Error::Secrets(format!(
                    "{} has insecure permissions {:o}. Please run: chmod 600 {}",
                    path.display(),
                    mode & 0o777,
                    path.display()
                )));
            }
        }

        let contents = std::fs::read_to_string(path)?;
        let mut secrets: Secrets = toml::from_str(&contents)
            .map_err(|e| Error::Secrets(format!("Failed to parse {}: {}", path.display(), e)))?;

        if let Some(token) = secrets.github.token.as_mut() {
            *token = token.trim().to_string();
        }

        Ok(secrets)
    }

    /// `~/.config/egg-hatcher/secrets.toml`
    pub fn default_secrets_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("egg-hatcher").join("secrets.toml"))
    }

    /// The token to use, preferring `GITHUB_TOKEN` over the file
    pub fn github_token(&self) -> Option<String> {
        self.resolve_token(std::env::var(TOKEN_ENV).ok())
    }

    fn resolve_token(&self, from_env: Option<String>) -> Option<String> {
        if let Some(token) = from_env.map(|t| t.trim().to_string()) {
            if !token.is_empty() {
                debug!("Using GitHub token from {}", TOKEN_ENV);
                return Some(token);
            }
        }

        match self.github.token.as_deref() {
            Some(token) if !token.is_empty() => {
                debug!("Using GitHub token from secrets file");
                Some(token.to_string())
            }
            _ => None,
        }
    }
}
