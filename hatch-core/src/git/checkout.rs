//! Checking out a ref inside a workspace copy of the mirror

use std::path::Path;

use git2::build::CheckoutBuilder;
use git2::Repository;

use crate::{Error, Result};

/// Force-checkout `refname` into the working tree at `work_dir` and detach HEAD on it
///
/// Returns the commit the ref resolved to.
pub fn checkout_detached(work_dir: &Path, refname: &str) -> Result<String> {
    let repo = Repository::open(work_dir)
        .map_err(|e| Error::Checkout(format!("Failed to open {}: {}", work_dir.display(), e)))?;

    let reference = repo
        .find_reference(refname)
        .map_err(|e| Error::Checkout(format!("Reference '{}' not found: {}", refname, e)))?;

    let commit = reference
        .peel_to_commit()
        .map_err(|e| Error::Checkout(format!("Failed to resolve {}: {}", refname, e)))?;

    let mut checkout = CheckoutBuilder::new();
    checkout.force().remove_untracked(true);

    repo.checkout_tree(commit.as_object(), Some(&mut checkout))
        .map_err(|e| Error::Checkout(format!("Failed to check out {}: {}", refname, e)))?;

    repo.set_head_detached(commit.id())
        .map_err(|e| Error::Checkout(format!("Failed to move HEAD to {}: {}", refname, e)))?;

    Ok(commit.id().to_string())
}
