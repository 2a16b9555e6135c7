//! Configuration management for egg-hatcher
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (EGG_HATCHER_*)
//! 3. Config file (~/.config/egg-hatcher/config.toml)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Upstream repository configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// URL of the upstream repository to mirror
    pub url: String,

    /// Prefixes stripped from tag names for display, applied in order
    pub tag_prefixes: Vec<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "https://github.com/RedHatInsights/insights-core".to_string(),
            tag_prefixes: vec!["insights-core-".to_string(), "falafel-".to_string()],
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on
    pub listen: String,

    /// Landing page served at `/`
    pub index_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:3000".to_string(),
            index_path: PathBuf::from("index.html"),
        }
    }
}

/// Background refresh configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// How often the mirror is fetched
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Age after which the fork list is refetched
    #[serde(with = "humantime_serde")]
    pub fork_ttl: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
            fork_ttl: Duration::from_secs(60 * 60),
        }
    }
}

/// Build step configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Program and arguments, run inside the checked-out workspace
    pub command: Vec<String>,

    /// Artifact produced by the command, relative to the workspace
    pub artifact: PathBuf,

    /// Deadline for a single build
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Refuse artifacts larger than this many bytes
    pub max_artifact_bytes: Option<u64>,

    /// Where the mirror and per-request workspaces are created (system temp dir if unset)
    pub workspace_root: Option<PathBuf>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            command: vec!["./build_client_egg.sh".to_string()],
            artifact: PathBuf::from("insights.zip"),
            timeout: Duration::from_secs(10 * 60),
            max_artifact_bytes: None,
            workspace_root: None,
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Upstream repository
    pub upstream: UpstreamConfig,

    /// HTTP server
    pub server: ServerConfig,

    /// Background refresh
    pub refresh: RefreshConfig,

    /// Build step
    pub build: BuildConfig,
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub upstream: Option<String>,
    pub listen: Option<String>,
    pub workspace_root: Option<PathBuf>,
    pub index_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if let Some(path) = config_path {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/egg-hatcher/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("egg-hatcher").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - EGG_HATCHER_UPSTREAM: upstream repository URL
    /// - EGG_HATCHER_LISTEN: listen address
    /// - EGG_HATCHER_WORKSPACE_ROOT: parent directory for mirror and workspaces
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("EGG_HATCHER_UPSTREAM") {
            self.upstream.url = url;
        }

        if let Ok(listen) = std::env::var("EGG_HATCHER_LISTEN") {
            self.server.listen = listen;
        }

        if let Ok(root) = std::env::var("EGG_HATCHER_WORKSPACE_ROOT") {
            self.build.workspace_root = Some(PathBuf::from(root));
        }

        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, cli: CliOverrides) -> Self {
        if let Some(url) = cli.upstream {
            self.upstream.url = url;
        }

        if let Some(listen) = cli.listen {
            self.server.listen = listen;
        }

        if let Some(root) = cli.workspace_root {
            self.build.workspace_root = Some(root);
        }

        if let Some(index) = cli.index_path {
            self.server.index_path = index;
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(config_path: Option<&Path>, cli: CliOverrides) -> Result<Self> {
        let base = match config_path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load()?,
        };

        let config = base.with_env_overrides().with_cli_overrides(cli);
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.build.command.is_empty() {
            return Err(Error::Config("build.command must not be empty".to_string()));
        }
        if self.refresh.interval.is_zero() {
            return Err(Error::Config("refresh.interval must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// Directory under which the mirror and build workspaces are created
    pub fn workspace_root(&self) -> PathBuf {
        self.build
            .workspace_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.listen, "127.0.0.1:3000");
        assert_eq!(config.refresh.interval, Duration::from_secs(300));
        assert_eq!(config.refresh.fork_ttl, Duration::from_secs(3600));
        assert_eq!(config.build.artifact, PathBuf::from("insights.zip"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_overrides() {
        let config = Config::default().with_cli_overrides(CliOverrides {
            upstream: Some("owner/project".to_string()),
            listen: Some("0.0.0.0:8080".to_string()),
            ..Default::default()
        });

        assert_eq!(config.upstream.url, "owner/project");
        assert_eq!(config.server.listen, "0.0.0.0:8080");
        assert!(config.build.workspace_root.is_none());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[upstream]
url = "https://github.com/example/project"
tag_prefixes = ["project-"]

[refresh]
interval = "30s"
fork_ttl = "2h"

[build]
command = ["sh", "build.sh"]
artifact = "out.zip"
max_artifact_bytes = 1024
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.upstream.tag_prefixes, vec!["project-".to_string()]);
        assert_eq!(config.refresh.interval, Duration::from_secs(30));
        assert_eq!(config.refresh.fork_ttl, Duration::from_secs(7200));
        assert_eq!(config.build.command, vec!["sh", "build.sh"]);
        assert_eq!(config.build.max_artifact_bytes, Some(1024));
        // Unset values keep their defaults
        assert_eq!(config.build.timeout, Duration::from_secs(600));
        assert_eq!(config.server.listen, "127.0.0.1:3000");
    }

    #[test]
    fn test_validate_rejects_empty_command() {
        let mut config = Config::default();
        config.build.command.clear();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
