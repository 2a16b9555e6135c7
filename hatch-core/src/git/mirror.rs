//! The long-lived local mirror of the upstream repository
//!
//! All access to the on-disk tree goes through [`Mirror`]. Operations that
//! mutate ref storage (fetching, adding remotes) take the write side of an
//! internal lock; copying the tree into a workspace takes the read side, so
//! a snapshot never observes a fetch halfway through.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use git2::build::RepoBuilder;
use git2::{
    AutotagOption, Direction, ErrorCode, FetchOptions, Remote, RemoteCallbacks, Repository,
};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::upstream::UpstreamRepo;
use crate::{Error, Result};

/// Name of the upstream remote
pub const ORIGIN: &str = "origin";

/// Prefix of every temporary directory the service creates
pub const TEMP_PREFIX: &str = "egg-hatcher-";

/// Result of fetching a remote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Nothing new on the remote
    Unchanged,
    /// Some refs moved
    Updated {
        /// Number of refs that were created or moved
        refs: usize,
    },
}

/// Result of registering a remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// The remote was already configured and was left alone
    Existed,
    /// The remote was added; `fetch_error` is set if the first fetch failed
    Created { fetch_error: Option<String> },
}

/// A ref as advertised by a remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisedRef {
    /// Full ref name, e.g. `refs/heads/main`
    pub name: String,
    /// Commit (or tag object) the ref points at
    pub oid: String,
}

/// The single local clone every request is served from
pub struct Mirror {
    root: TempDir,
    upstream: UpstreamRepo,
    lock: RwLock<()>,
}

impl std::fmt::Debug for Mirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mirror")
            .field("root", &self.root.path())
            .field("upstream", &self.upstream.clone_url)
            .finish_non_exhaustive()
    }
}

impl Mirror {
    /// Clone the upstream into a fresh temporary directory under `parent`
    ///
    /// The directory is removed when the mirror is dropped.
    pub fn initialize(upstream: UpstreamRepo, parent: &Path) -> Result<Self> {
        fs::create_dir_all(parent)
            .map_err(|e| Error::Clone(format!("Failed to create {}: {}", parent.display(), e)))?;

        let root = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempdir_in(parent)
            .map_err(|e| Error::Clone(format!("Failed to create mirror directory: {}", e)))?;

        info!("git clone {} {}", upstream.clone_url, root.path().display());

        let mut fetch_options = FetchOptions::new();
        fetch_options.download_tags(AutotagOption::All);

        RepoBuilder::new()
            .fetch_options(fetch_options)
            .clone(&upstream.clone_url, root.path())
            .map_err(|e| Error::Clone(format!("{}: {}", upstream.clone_url, e)))?;

        Ok(Self {
            root,
            upstream,
            lock: RwLock::new(()),
        })
    }

    /// Path of the mirror's working tree
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// The upstream this mirror was cloned from
    pub fn upstream(&self) -> &UpstreamRepo {
        &self.upstream
    }

    /// Fetch `origin`, including tags
    pub fn refresh(&self) -> Result<FetchOutcome> {
        let _guard = self.write();
        let repo = self.open()?;
        fetch_remote(&repo, ORIGIN, AutotagOption::All)
    }

    /// Make sure a remote called `name` exists, adding and fetching it if not
    ///
    /// A failed first fetch does not undo the registration.
    pub fn ensure_remote(&self, name: &str, url: &str) -> Result<RemoteOutcome> {
        validate_remote_name(name)?;

        let _guard = self.write();
        let repo = self.open()?;

        match repo.find_remote(name) {
            Ok(_) => return Ok(RemoteOutcome::Existed),
            Err(e) if e.code() == ErrorCode::NotFound => {}
            Err(e) => {
                return Err(Error::Remote(format!(
                    "Failed to look up remote '{}': {}",
                    name, e
                )))
            }
        }

        repo.remote(name, url)
            .map_err(|e| Error::Remote(format!("Failed to create remote '{}': {}", name, e)))?;
        info!(remote = %name, url = %url, "Added remote");

        // Tags share one namespace; only origin may write them
        let fetch_error = match fetch_remote(&repo, name, AutotagOption::None) {
            Ok(outcome) => {
                debug!(remote = %name, ?outcome, "Fetched new remote");
                None
            }
            Err(e) => {
                warn!(remote = %name, "Initial fetch of new remote failed: {}", e);
                Some(e.to_string())
            }
        };

        Ok(RemoteOutcome::Created { fetch_error })
    }

    /// Copy the whole mirror, `.git` included, into `dest`
    pub fn snapshot(&self, dest: &Path) -> Result<()> {
        let _guard = self.read();
        let files = copy_tree(self.root(), dest).map_err(|e| {
            Error::Copy(format!(
                "{} -> {}: {}",
                self.root().display(),
                dest.display(),
                e
            ))
        })?;
        debug!(dest = %dest.display(), files, "Copied mirror");
        Ok(())
    }

    /// Ask a remote which refs it currently advertises
    ///
    /// This talks to the network; it reads only the remote's configuration
    /// from the mirror and so does not take the tree lock.
    pub fn list_remote(&self, name: &str) -> Result<Vec<AdvertisedRef>> {
        let repo = self.open()?;
        let mut remote = repo
            .find_remote(name)
            .map_err(|e| Error::Remote(format!("Remote '{}' not found: {}", name, e)))?;

        list_advertised(&mut remote)
            .map_err(|e| Error::Remote(format!("Failed to list refs of '{}': {}", name, e)))
    }

    fn open(&self) -> Result<Repository> {
        Repository::open(self.root()).map_err(|e| {
            Error::MirrorUnavailable(format!("{}: {}", self.root().display(), e))
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Fetch all configured refspecs of a remote, with `tags` deciding what happens to its tags
fn fetch_remote(repo: &Repository, remote_name: &str, tags: AutotagOption) -> Result<FetchOutcome> {
    let mut remote = repo
        .find_remote(remote_name)
        .map_err(|e| Error::Remote(format!("Remote '{}' not found: {}", remote_name, e)))?;

    let mut updated = 0usize;
    {
        let mut callbacks = RemoteCallbacks::new();
        callbacks.update_tips(|_, _, _| {
            updated += 1;
            true
        });

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(callbacks);
        fetch_options.download_tags(tags);

        remote
            .fetch(&[] as &[&str], Some(&mut fetch_options), None)
            .map_err(|e| Error::Fetch(format!("{}: {}", remote_name, e)))?;
    }

    if updated == 0 {
        Ok(FetchOutcome::Unchanged)
    } else {
        Ok(FetchOutcome::Updated { refs: updated })
    }
}

fn list_advertised(
    remote: &mut Remote<'_>,
) -> std::result::Result<Vec<AdvertisedRef>, git2::Error> {
    remote.connect(Direction::Fetch)?;
    let refs = remote
        .list()?
        .iter()
        .map(|head| AdvertisedRef {
            name: head.name().to_string(),
            oid: head.oid().to_string(),
        })
        .collect();
    remote.disconnect()?;
    Ok(refs)
}

/// Remote names double as path components of the fork URL
fn validate_remote_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidRef("remote name cannot be empty".to_string()));
    }
    if name.contains('/')
        || name.contains("..")
        || name.starts_with('-')
        || !Remote::is_valid_name(name)
    {
        return Err(Error::InvalidRef(format!("invalid remote name '{}'", name)));
    }
    Ok(())
}

/// Recursively copy `src` into `dest`, returning the number of files copied
fn copy_tree(src: &Path, dest: &Path) -> io::Result<u64> {
    let mut files = 0;

    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry.path().strip_prefix(src).map_err(io::Error::other)?;
        let target = dest.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            #[cfg(unix)]
            std::os::unix::fs::symlink(&link, &target)?;
            #[cfg(not(unix))]
            fs::copy(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
            files += 1;
        }
    }

    Ok(files)
}
