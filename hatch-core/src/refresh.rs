//! Background refresh of the mirror and the fork list

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::RefreshConfig;
use crate::forks::{ForkCache, ForkSource};
use crate::git::{FetchOutcome, Mirror};
use crate::Error;

/// What the loop should do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// The mirror root is gone; further ticks cannot succeed
    Stop,
}

/// Periodically fetches the mirror and refetches stale fork lists
pub struct RefreshLoop {
    mirror: Arc<Mirror>,
    forks: Arc<ForkCache>,
    source: Arc<dyn ForkSource>,
    interval: Duration,
    fork_ttl: Duration,
}

impl std::fmt::Debug for RefreshLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshLoop")
            .field("mirror", &self.mirror)
            .field("interval", &self.interval)
            .field("fork_ttl", &self.fork_ttl)
            .finish_non_exhaustive()
    }
}

impl RefreshLoop {
    pub fn new(
        mirror: Arc<Mirror>,
        forks: Arc<ForkCache>,
        source: Arc<dyn ForkSource>,
        config: &RefreshConfig,
    ) -> Self {
        Self {
            mirror,
            forks,
            source,
            interval: config.interval,
            fork_ttl: config.fork_ttl,
        }
    }

    /// Run the loop on the runtime until `shutdown` flips to `true` or its sender is dropped
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// The loop body; the first tick fires one interval after start
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval = ?self.interval, "Refresh loop started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Refresh loop stopping");
                        return;
                    }
                    continue;
                }
            }

            if self.tick().await == TickOutcome::Stop {
                error!("Refresh loop stopped; serving stale data from now on");
                return;
            }
        }
    }

    /// One refresh pass
    pub async fn tick(&self) -> TickOutcome {
        if self.forks.is_stale(self.fork_ttl) {
            let upstream = self.mirror.upstream();
            if let Err(e) = self
                .forks
                .refresh(self.source.as_ref(), &upstream.owner, &upstream.project)
                .await
            {
                warn!("Fork list refresh failed, keeping previous list: {}", e);
            }
        }

        info!("git fetch");
        let mirror = Arc::clone(&self.mirror);
        match tokio::task::spawn_blocking(move || mirror.refresh()).await {
            Ok(Ok(FetchOutcome::Unchanged)) => debug!("Mirror already up to date"),
            Ok(Ok(FetchOutcome::Updated { refs })) => info!(refs, "Mirror updated"),
            Ok(Err(Error::MirrorUnavailable(e))) => {
                error!("Cannot open mirror: {}", e);
                return TickOutcome::Stop;
            }
            Ok(Err(e)) => warn!("Error: {}", e),
            Err(e) => warn!("Fetch task failed: {}", e),
        }

        TickOutcome::Continue
    }
}
