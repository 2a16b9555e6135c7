//! Per-request isolated checkout and build
//!
//! Every request gets its own copy of the mirror in a fresh temporary
//! directory. The directory is owned by the request and removed on every
//! exit path, including when the request future is dropped mid-build.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::builder::Builder;
use crate::git::{checkout_detached, Mirror, ORIGIN, TEMP_PREFIX};
use crate::{Error, Result};

/// Content type of built eggs
pub const EGG_CONTENT_TYPE: &str = "application/zip";

/// What to build
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildTarget {
    /// A branch of `origin` or of a fork remote
    Branch { remote: String, name: String },
    /// A tag of the upstream
    Tag { name: String },
}

impl BuildTarget {
    pub fn branch(remote: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Branch {
            remote: remote.into(),
            name: name.into(),
        }
    }

    pub fn upstream_branch(name: impl Into<String>) -> Self {
        Self::branch(ORIGIN, name)
    }

    pub fn tag(name: impl Into<String>) -> Self {
        Self::Tag { name: name.into() }
    }

    /// Short name of the branch or tag
    pub fn name(&self) -> &str {
        match self {
            Self::Branch { name, .. } | Self::Tag { name } => name,
        }
    }

    /// Fully qualified ref inside a copy of the mirror
    pub fn refname(&self) -> String {
        match self {
            Self::Branch { remote, name } => format!("refs/remotes/{}/{}", remote, name),
            Self::Tag { name } => format!("refs/tags/{}", name),
        }
    }

    /// Reject names that can never resolve, before touching disk or network
    pub fn validate(&self) -> Result<()> {
        let name = self.name();
        if name.is_empty() {
            return Err(Error::InvalidRef("missing required parameter: name".to_string()));
        }
        if name.contains("..") || name.starts_with('-') || name.bytes().any(|b| b < 0x20) {
            return Err(Error::InvalidRef(format!("invalid ref name '{}'", name)));
        }
        if let Self::Branch { remote, .. } = self {
            if remote.is_empty() || remote.contains('/') {
                return Err(Error::InvalidRef(format!("invalid remote name '{}'", remote)));
            }
        }
        Ok(())
    }
}

/// A built egg, ready to be sent
#[derive(Debug, Clone)]
pub struct Artifact {
    /// `<project>-<ref>-<commit>.egg`
    pub filename: String,
    pub content_type: &'static str,
    /// Commit the workspace was built from
    pub commit: String,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn content_length(&self) -> usize {
        self.bytes.len()
    }
}

/// Name of the egg served for `ref_name` at `commit`
pub fn egg_filename(project: &str, ref_name: &str, commit: &str) -> String {
    let safe_ref = ref_name.replace(['/', '\\', ':'], "-");
    format!("{}-{}-{}.egg", project, safe_ref, commit)
}

/// Copies the mirror, checks out a ref, runs the builder and collects the egg
pub struct BuildPipeline {
    mirror: Arc<Mirror>,
    builder: Arc<dyn Builder>,
    workspace_root: PathBuf,
    max_artifact_bytes: Option<u64>,
}

impl std::fmt::Debug for BuildPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildPipeline")
            .field("mirror", &self.mirror)
            .field("workspace_root", &self.workspace_root)
            .field("max_artifact_bytes", &self.max_artifact_bytes)
            .finish_non_exhaustive()
    }
}

impl BuildPipeline {
    pub fn new(
        mirror: Arc<Mirror>,
        builder: Arc<dyn Builder>,
        workspace_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            mirror,
            builder,
            workspace_root: workspace_root.into(),
            max_artifact_bytes: None,
        }
    }

    /// Refuse artifacts larger than `limit` bytes
    pub fn with_max_artifact_bytes(mut self, limit: Option<u64>) -> Self {
        self.max_artifact_bytes = limit;
        self
    }

    /// Build `target` in a private workspace
    pub async fn build(&self, target: &BuildTarget) -> Result<Artifact> {
        target.validate()?;

        let workspace = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempdir_in(&self.workspace_root)
            .map_err(|e| {
                Error::Copy(format!(
                    "Failed to create workspace in {}: {}",
                    self.workspace_root.display(),
                    e
                ))
            })?;

        info!(git_ref = %target.refname(), workspace = %workspace.path().display(), "Building egg");

        // The blocking task owns the workspace while it copies into it, so a
        // dropped request cannot delete the directory underneath the copy.
        let mirror = Arc::clone(&self.mirror);
        let refname = target.refname();
        let (workspace, checkout) = tokio::task::spawn_blocking(move || {
            let result = prepare_workspace(&mirror, workspace.path(), &refname);
            (workspace, result)
        })
        .await
        .map_err(|e| Error::Other(format!("Workspace preparation task failed: {}", e)))?;

        let result = match checkout {
            Ok(commit) => self.build_checked_out(target, workspace.path(), commit).await,
            Err(e) => Err(e),
        };

        let path = workspace.path().to_path_buf();
        if let Err(e) = workspace.close() {
            warn!(workspace = %path.display(), "Failed to remove workspace: {}", e);
        }

        result
    }

    async fn build_checked_out(
        &self,
        target: &BuildTarget,
        work_dir: &Path,
        commit: String,
    ) -> Result<Artifact> {
        let artifact_path = self.builder.build(work_dir).await?;
        let bytes = read_artifact(&artifact_path, self.max_artifact_bytes).await?;

        let filename = egg_filename(&self.mirror.upstream().project, target.name(), &commit);
        debug!(filename = %filename, size = bytes.len(), "Egg ready");

        Ok(Artifact {
            filename,
            content_type: EGG_CONTENT_TYPE,
            commit,
            bytes,
        })
    }
}

fn prepare_workspace(mirror: &Mirror, work_dir: &Path, refname: &str) -> Result<String> {
    mirror.snapshot(work_dir)?;
    checkout_detached(work_dir, refname)
}

async fn read_artifact(path: &Path, limit: Option<u64>) -> Result<Vec<u8>> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| Error::Artifact(format!("{}: {}", path.display(), e)))?;

    if let Some(limit) = limit {
        if metadata.len() > limit {
            return Err(Error::Artifact(format!(
                "artifact is {} bytes, limit is {}",
                metadata.len(),
                limit
            )));
        }
    }

    tokio::fs::read(path)
        .await
        .map_err(|e| Error::Artifact(format!("{}: {}", path.display(), e)))
}
