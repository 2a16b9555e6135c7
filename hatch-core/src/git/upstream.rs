//! Upstream repository URL parsing and fork URL derivation

use std::path::Path;

use crate::{Error, Result};

/// The single upstream repository being mirrored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRepo {
    /// Repository owner/organization
    pub owner: String,
    /// Project (repository) name
    pub project: String,
    /// Host (e.g., "github.com"), empty for local repositories
    pub host: String,
    /// URL the mirror is cloned from
    pub clone_url: String,
    /// Prefix that `<owner>/<project>` is appended to for forks
    fork_base: String,
}

impl UpstreamRepo {
    /// Parse a repository URL or shorthand
    ///
    /// Supports:
    /// - `https://github.com/owner/project`
    /// - `https://github.com/owner/project.git`
    /// - `git@github.com:owner/project.git`
    /// - `owner/project` (assumes GitHub)
    /// - `file:///path/owner/project` or an absolute local path
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        // Local repositories: forks are looked up as siblings of the owner directory
        let local = input
            .strip_prefix("file://")
            .or_else(|| input.starts_with('/').then_some(input));
        if let Some(path) = local {
            return Self::parse_local(input, Path::new(path));
        }

        // Handle owner/project shorthand (assumes GitHub)
        if !input.contains("://") && !input.contains('@') && input.contains('/') {
            let parts: Vec<&str> = input.split('/').collect();
            if parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty() {
                let owner = parts[0].to_string();
                let project = parts[1].trim_end_matches(".git").to_string();
                return Ok(Self {
                    clone_url: format!("https://github.com/{}/{}", owner, project),
                    owner,
                    project,
                    host: "github.com".to_string(),
                    fork_base: "https://github.com".to_string(),
                });
            }
        }

        // Handle git@ URLs (e.g., git@github.com:owner/project.git)
        if let Some(rest) = input.strip_prefix("git@") {
            if let Some((host, path)) = rest.split_once(':') {
                let path = path.trim_end_matches(".git");
                let parts: Vec<&str> = path.split('/').collect();
                if parts.len() >= 2 {
                    return Ok(Self {
                        owner: parts[0].to_string(),
                        project: parts[1].to_string(),
                        host: host.to_string(),
                        clone_url: input.to_string(),
                        fork_base: format!("https://{}", host),
                    });
                }
            }
        }

        // Handle https:// URLs
        if input.starts_with("https://") || input.starts_with("http://") {
            if let Ok(url) = url::Url::parse(input) {
                let host = url.host_str().unwrap_or("").to_string();
                let path = url.path().trim_start_matches('/').trim_end_matches(".git");
                let parts: Vec<&str> = path.split('/').collect();

                if parts.len() >= 2 && !host.is_empty() {
                    return Ok(Self {
                        owner: parts[0].to_string(),
                        project: parts[1].to_string(),
                        fork_base: format!("{}://{}", url.scheme(), host),
                        host,
                        clone_url: input.to_string(),
                    });
                }
            }
        }

        Err(Error::Config(format!(
            "Invalid repository URL: {}. Expected format: owner/project, \
             https://github.com/owner/project, or git@github.com:owner/project.git",
            input
        )))
    }

    fn parse_local(input: &str, path: &Path) -> Result<Self> {
        let name = |p: Option<&Path>| {
            p.and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .map(|n| n.trim_end_matches(".git").to_string())
                .filter(|n| !n.is_empty())
        };

        let owner_dir = path.parent();
        match (name(Some(path)), name(owner_dir)) {
            (Some(project), Some(owner)) => Ok(Self {
                owner,
                project,
                host: String::new(),
                clone_url: input.to_string(),
                fork_base: owner_dir
                    .and_then(|p| p.parent())
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            }),
            _ => Err(Error::Config(format!(
                "Invalid local repository path: {}. Expected .../owner/project",
                input
            ))),
        }
    }

    /// URL of `owner`'s fork of the upstream project
    pub fn fork_url(&self, owner: &str) -> String {
        format!("{}/{}/{}", self.fork_base, owner, self.project)
    }

    /// `owner/project`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shorthand() {
        let repo = UpstreamRepo::parse("RedHatInsights/insights-core").unwrap();
        assert_eq!(repo.owner, "RedHatInsights");
        assert_eq!(repo.project, "insights-core");
        assert_eq!(repo.host, "github.com");
        assert_eq!(repo.clone_url, "https://github.com/RedHatInsights/insights-core");
    }

    #[test]
    fn test_parse_https() {
        let repo = UpstreamRepo::parse("https://github.com/RedHatInsights/insights-core").unwrap();
        assert_eq!(repo.owner, "RedHatInsights");
        assert_eq!(repo.project, "insights-core");
        assert_eq!(repo.full_name(), "RedHatInsights/insights-core");
    }

    #[test]
    fn test_parse_https_with_git() {
        let repo = UpstreamRepo::parse("https://github.com/owner/project.git").unwrap();
        assert_eq!(repo.project, "project");
        assert_eq!(repo.clone_url, "https://github.com/owner/project.git");
    }

    #[test]
    fn test_parse_git_ssh() {
        let repo = UpstreamRepo::parse("git@github.com:owner/project.git").unwrap();
        assert_eq!(repo.owner, "owner");
        assert_eq!(repo.project, "project");
        assert_eq!(repo.fork_url("someone"), "https://github.com/someone/project");
    }

    #[test]
    fn test_parse_local_path() {
        let repo = UpstreamRepo::parse("/srv/repos/owner/project").unwrap();
        assert_eq!(repo.owner, "owner");
        assert_eq!(repo.project, "project");
        assert_eq!(repo.fork_url("alice"), "/srv/repos/alice/project");
    }

    #[test]
    fn test_fork_url() {
        let repo = UpstreamRepo::parse("https://github.com/RedHatInsights/insights-core").unwrap();
        assert_eq!(
            repo.fork_url("alice"),
            "https://github.com/alice/insights-core"
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert!(UpstreamRepo::parse("invalid").is_err());
        assert!(UpstreamRepo::parse("").is_err());
        assert!(UpstreamRepo::parse("https://github.com/only-owner").is_err());
    }
}
