//! Cached list of the upstream's forks
//!
//! Readers clone an `Arc` to the current [`ForkSnapshot`] under a short read
//! lock. A refresh builds the replacement list with no lock held and only
//! takes the write lock to swap the pointer, so a reader sees either the old
//! list or the new one in full.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Result;

/// A fork as reported by the hosting service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkInfo {
    /// Login of the fork's owner
    pub owner: String,
    /// `owner/project`
    pub full_name: String,
}

/// Anything that can enumerate the forks of a repository
#[async_trait]
pub trait ForkSource: Send + Sync {
    /// Every fork of `owner/project`, across all pages
    async fn list_forks(&self, owner: &str, project: &str) -> Result<Vec<ForkInfo>>;
}

/// One entry of the `/fork` listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkEntry {
    #[serde(rename = "fullName")]
    pub full_name: String,
    pub name: String,
}

/// An immutable fork list and when it was captured
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForkSnapshot {
    pub entries: Vec<ForkEntry>,
    /// `None` until the first successful refresh
    pub captured_at: Option<DateTime<Utc>>,
}

impl ForkSnapshot {
    /// Whether the snapshot is older than `ttl` (never-populated snapshots always are)
    pub fn is_older_than(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        match self.captured_at {
            None => true,
            Some(at) => {
                let age = now.signed_duration_since(at);
                age.to_std().is_ok_and(|age| age > ttl)
            }
        }
    }
}

/// Shared, swap-on-refresh fork list
#[derive(Debug, Default)]
pub struct ForkCache {
    current: RwLock<Arc<ForkSnapshot>>,
}

impl ForkCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot
    pub fn get(&self) -> Arc<ForkSnapshot> {
        let guard = self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Whether the cache should be refreshed on the next tick
    pub fn is_stale(&self, ttl: Duration) -> bool {
        self.get().is_older_than(ttl, Utc::now())
    }

    /// Refetch the fork list and install it
    ///
    /// On error the previous snapshot stays in place.
    pub async fn refresh(&self, source: &dyn ForkSource, owner: &str, project: &str) -> Result<()> {
        debug!(owner = %owner, project = %project, "Refreshing fork list");
        let forks = source.list_forks(owner, project).await?;

        let mut entries = Vec::with_capacity(forks.len() + 1);
        entries.push(ForkEntry {
            full_name: format!("{}/{}", owner, project),
            name: owner.to_string(),
        });
        entries.extend(forks.into_iter().map(|fork| ForkEntry {
            full_name: fork.full_name,
            name: fork.owner,
        }));

        let snapshot = Arc::new(ForkSnapshot {
            entries,
            captured_at: Some(Utc::now()),
        });
        let count = snapshot.entries.len();

        *self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = snapshot;

        info!(count, "Fork list refreshed");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves a scripted sequence of responses, one per call
    pub(crate) struct ScriptedSource {
        responses: std::sync::Mutex<Vec<Result<Vec<ForkInfo>>>>,
        pub calls: AtomicUsize,
    }

    impl ScriptedSource {
        pub(crate) fn new(responses: Vec<Result<Vec<ForkInfo>>>) -> Self {
            Self {
                responses: std::sync::Mutex::new(responses.into_iter().rev().collect()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ForkSource for ScriptedSource {
        async fn list_forks(&self, _owner: &str, _project: &str) -> Result<Vec<ForkInfo>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(Error::ForkList("no more responses".to_string())))
        }
    }

    pub(crate) fn fork(owner: &str) -> ForkInfo {
        ForkInfo {
            owner: owner.to_string(),
            full_name: format!("{}/insights-core", owner),
        }
    }

    #[tokio::test]
    async fn test_refresh_prepends_upstream_entry() {
        let cache = ForkCache::new();
        let source = ScriptedSource::new(vec![Ok(vec![fork("alice"), fork("bob")])]);

        cache.refresh(&source, "RedHatInsights", "insights-core").await.unwrap();

        let snapshot = cache.get();
        let json = serde_json::to_value(&snapshot.entries).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"fullName": "RedHatInsights/insights-core", "name": "RedHatInsights"},
                {"fullName": "alice/insights-core", "name": "alice"},
                {"fullName": "bob/insights-core", "name": "bob"},
            ])
        );
        assert!(snapshot.captured_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let cache = ForkCache::new();
        let source = ScriptedSource::new(vec![
            Ok(vec![fork("alice")]),
            Err(Error::ForkList("rate limited".to_string())),
        ]);

        cache.refresh(&source, "owner", "insights-core").await.unwrap();
        let before = cache.get();

        let result = cache.refresh(&source, "owner", "insights-core").await;
        assert!(matches!(result, Err(Error::ForkList(_))));

        let after = cache.get();
        assert_eq!(*before, *after);
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(
            serde_json::to_vec(&before.entries).unwrap(),
            serde_json::to_vec(&after.entries).unwrap()
        );
    }

    #[tokio::test]
    async fn test_readers_keep_their_snapshot_across_refresh() {
        let cache = ForkCache::new();
        let source = ScriptedSource::new(vec![
            Ok(vec![fork("alice")]),
            Ok(vec![fork("bob"), fork("carol")]),
        ]);

        cache.refresh(&source, "owner", "insights-core").await.unwrap();
        let held = cache.get();
        cache.refresh(&source, "owner", "insights-core").await.unwrap();

        assert_eq!(held.entries.len(), 2);
        assert_eq!(held.entries[1].name, "alice");
        let fresh = cache.get();
        assert_eq!(fresh.entries.len(), 3);
        assert!(fresh.captured_at >= held.captured_at);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_readers_see_whole_lists() {
        let cache = Arc::new(ForkCache::new());
        let small: Vec<ForkInfo> = (0..3).map(|i| fork(&format!("small{}", i))).collect();
        let large: Vec<ForkInfo> = (0..50).map(|i| fork(&format!("large{}", i))).collect();

        let mut responses = Vec::new();
        for i in 0..20 {
            responses.push(Ok(if i % 2 == 0 { small.clone() } else { large.clone() }));
        }
        let source = Arc::new(ScriptedSource::new(responses));
        cache.refresh(source.as_ref(), "owner", "insights-core").await.unwrap();

        let writer = {
            let cache = Arc::clone(&cache);
            let source = Arc::clone(&source);
            tokio::spawn(async move {
                for _ in 0..19 {
                    cache.refresh(source.as_ref(), "owner", "insights-core").await.unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    for _ in 0..200 {
                        let snapshot = cache.get();
                        let forks = &snapshot.entries[1..];
                        let all_small = forks.iter().all(|e| e.name.starts_with("small"));
                        let all_large = forks.iter().all(|e| e.name.starts_with("large"));
                        assert!(
                            (all_small && forks.len() == 3) || (all_large && forks.len() == 50),
                            "torn snapshot with {} entries",
                            forks.len()
                        );
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
    }

    #[test]
    fn test_staleness() {
        let now = Utc::now();
        let ttl = Duration::from_secs(3600);

        assert!(ForkSnapshot::default().is_older_than(ttl, now));

        let fresh = ForkSnapshot {
            entries: Vec::new(),
            captured_at: Some(now - chrono::Duration::minutes(10)),
        };
        assert!(!fresh.is_older_than(ttl, now));

        let old = ForkSnapshot {
            entries: Vec::new(),
            captured_at: Some(now - chrono::Duration::minutes(61)),
        };
        assert!(old.is_older_than(ttl, now));
    }

    #[test]
    fn test_new_cache_is_stale_and_empty() {
        let cache = ForkCache::new();
        assert!(cache.is_stale(Duration::from_secs(3600)));
        assert!(cache.get().entries.is_empty());
    }
}
