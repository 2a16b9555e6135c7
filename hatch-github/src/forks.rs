//! Fork enumeration through the REST API

use std::future::Future;

use async_trait::async_trait;
use hatch_core::{ForkInfo, ForkSource};
use octocrab::models::Repository;
use tracing::{debug, warn};

use crate::client::GitHubClient;
use crate::{Error, Result};

/// Forks requested per page (the API maximum)
const PER_PAGE: u8 = 100;

impl GitHubClient {
    /// Every fork of `owner/repo`, following pagination to the end
    pub async fn list_all_forks(&self, owner: &str, repo: &str) -> Result<Vec<ForkInfo>> {
        debug!(owner = %owner, repo = %repo, "Listing forks");

        let forks = collect_pages(|page| async move {
            let page = self
                .client()
                .repos(owner, repo)
                .list_forks()
                .per_page(PER_PAGE)
                .page(page)
                .send()
                .await
                .map_err(|e| classify_error(e, owner, repo))?;
            Ok(page.items)
        })
        .await?;

        let total = forks.len();
        let forks: Vec<ForkInfo> = forks.iter().filter_map(fork_info).collect();
        if forks.len() < total {
            warn!(skipped = total - forks.len(), "Skipped forks without a name or owner");
        }

        debug!(count = forks.len(), "Listed forks");
        Ok(forks)
    }
}

#[async_trait]
impl ForkSource for GitHubClient {
    async fn list_forks(&self, owner: &str, project: &str) -> hatch_core::Result<Vec<ForkInfo>> {
        Ok(self.list_all_forks(owner, project).await?)
    }
}

/// Fetch pages starting at 1 until one comes back empty
async fn collect_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let mut all = Vec::new();
    let mut page = 1u32;

    loop {
        let items = fetch(page).await?;
        if items.is_empty() {
            break;
        }
        all.extend(items);
        page += 1;
    }

    Ok(all)
}

fn fork_info(repo: &Repository) -> Option<ForkInfo> {
    let full_name = repo.full_name.clone()?;
    let owner = repo.owner.as_ref()?.login.clone();
    Some(ForkInfo { owner, full_name })
}

fn classify_error(err: octocrab::Error, owner: &str, repo: &str) -> Error {
    match err {
        octocrab::Error::GitHub { source, backtrace } => {
            let message = source.message.to_ascii_lowercase();
            if message.contains("not found") {
                Error::RepoNotFound(format!("{}/{}", owner, repo))
            } else if message.contains("rate limit") {
                Error::RateLimited(source.message.clone())
            } else if message.contains("bad credentials") {
                Error::Auth("Invalid GitHub token".to_string())
            } else {
                Error::Api(octocrab::Error::GitHub { source, backtrace })
            }
        }
        other => Error::Api(other),
    }
}
