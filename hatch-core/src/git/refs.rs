//! Listing and classifying the branches and tags a remote advertises

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::mirror::{AdvertisedRef, Mirror, RemoteOutcome, ORIGIN};
use crate::{Error, Result};

/// Kind of an advertised ref
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Branch,
    Tag,
}

/// A branch or tag of one remote, resolved at listing time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    pub kind: RefKind,
    /// Display name (tag prefixes already stripped)
    pub name: String,
    /// `<remote>/<branch>` for branches, the unstripped tag name for tags
    pub full_name: String,
    /// Object id the remote advertised
    pub commit: String,
}

/// Branch as returned to HTTP clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchEntry {
    pub name: String,
    #[serde(rename = "fullBranch")]
    pub full_branch: String,
}

/// Tag as returned to HTTP clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagEntry {
    #[serde(rename = "fullTag")]
    pub full_tag: String,
    pub name: String,
}

/// Strip the first matching prefix of each kind, in order
///
/// `insights-core-1.2.3` and `falafel-1.2.3` both become `1.2.3`.
pub fn strip_tag_prefixes(tag: &str, prefixes: &[String]) -> String {
    prefixes
        .iter()
        .fold(tag, |name, prefix| name.strip_prefix(prefix.as_str()).unwrap_or(name))
        .to_string()
}

/// Turn a raw ref advertisement into sorted branches and tags
///
/// Peeled tag entries (`^{}`) and symbolic `HEAD` are dropped. The result is
/// ordered by display name; the sort is stable so equal names keep their
/// advertisement order.
pub fn classify(
    remote: &str,
    advertised: &[AdvertisedRef],
    tag_prefixes: &[String],
) -> Vec<RemoteRef> {
    let mut refs: Vec<RemoteRef> = advertised
        .iter()
        .filter(|r| !r.name.ends_with("^{}"))
        .filter_map(|r| {
            if let Some(branch) = r.name.strip_prefix("refs/heads/") {
                Some(RemoteRef {
                    kind: RefKind::Branch,
                    name: branch.to_string(),
                    full_name: format!("{}/{}", remote, branch),
                    commit: r.oid.clone(),
                })
            } else {
                r.name.strip_prefix("refs/tags/").map(|tag| RemoteRef {
                    kind: RefKind::Tag,
                    name: strip_tag_prefixes(tag, tag_prefixes),
                    full_name: tag.to_string(),
                    commit: r.oid.clone(),
                })
            }
        })
        .collect();

    refs.sort_by(|a, b| a.name.cmp(&b.name));
    refs
}

/// Lists refs of the upstream and its forks through the mirror
#[derive(Debug, Clone)]
pub struct RefResolver {
    mirror: Arc<Mirror>,
    tag_prefixes: Vec<String>,
}

impl RefResolver {
    pub fn new(mirror: Arc<Mirror>, tag_prefixes: Vec<String>) -> Self {
        Self { mirror, tag_prefixes }
    }

    /// Branches of `remote`, adding the fork remote on first use
    pub async fn branches(&self, remote: &str) -> Result<Vec<BranchEntry>> {
        let refs = self.list(remote).await?;
        Ok(refs
            .into_iter()
            .filter(|r| r.kind == RefKind::Branch)
            .map(|r| BranchEntry {
                name: r.name,
                full_branch: r.full_name,
            })
            .collect())
    }

    /// Tags of the upstream
    pub async fn tags(&self) -> Result<Vec<TagEntry>> {
        let refs = self.list(ORIGIN).await?;
        Ok(refs
            .into_iter()
            .filter(|r| r.kind == RefKind::Tag)
            .map(|r| TagEntry {
                full_tag: r.full_name,
                name: r.name,
            })
            .collect())
    }

    /// Every branch and tag of `remote`, sorted by display name
    pub async fn list(&self, remote: &str) -> Result<Vec<RemoteRef>> {
        let mirror = Arc::clone(&self.mirror);
        let prefixes = self.tag_prefixes.clone();
        let remote = remote.to_string();

        tokio::task::spawn_blocking(move || {
            if remote != ORIGIN {
                let url = mirror.upstream().fork_url(&remote);
                if let RemoteOutcome::Created { fetch_error: Some(e) } =
                    mirror.ensure_remote(&remote, &url)?
                {
                    warn!(remote = %remote, "Listing fork whose first fetch failed: {}", e);
                }
            }

            let advertised = mirror.list_remote(&remote)?;
            let refs = classify(&remote, &advertised, &prefixes);
            debug!(remote = %remote, count = refs.len(), "Listed refs");
            Ok(refs)
        })
        .await
        .map_err(|e| Error::Other(format!("Ref listing task failed: {}", e)))?
    }
}
