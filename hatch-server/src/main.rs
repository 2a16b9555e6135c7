//! egg-hatcher - build insights-core eggs from any upstream or fork ref
//!
//! Keeps one mirror of the upstream repository, refreshes it in the
//! background, and serves eggs built from isolated copies of it over HTTP.

mod error;
mod handlers;
mod server;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use hatch_core::{
    BuildPipeline, CliOverrides, Config, ForkCache, ForkSource, Mirror, RefResolver,
    RefreshLoop, ScriptBuilder, UpstreamRepo,
};
use hatch_github::GitHubClient;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use state::AppState;

/// Serve on-demand egg builds of an upstream repository and its forks
#[derive(Parser, Debug)]
#[command(name = "egg-hatcher")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (default: ~/.config/egg-hatcher/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Upstream repository URL or owner/project
    #[arg(long)]
    upstream: Option<String>,

    /// Address to listen on
    #[arg(long)]
    listen: Option<String>,

    /// Directory for the mirror and build workspaces
    #[arg(long)]
    workspace_root: Option<PathBuf>,

    /// Landing page served at /
    #[arg(long)]
    index: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let overrides = CliOverrides {
        upstream: cli.upstream,
        listen: cli.listen,
        workspace_root: cli.workspace_root,
        index_path: cli.index,
    };
    let config = Config::load_with_overrides(cli.config.as_deref(), overrides)
        .context("Failed to load configuration")?;

    if cli.verbose {
        info!(
            upstream = %config.upstream.url,
            listen = %config.server.listen,
            interval = ?config.refresh.interval,
            "Configuration loaded"
        );
    }

    let upstream = UpstreamRepo::parse(&config.upstream.url)?;
    info!(upstream = %upstream.full_name(), host = %upstream.host, "Serving eggs");
    let workspace_root = config.workspace_root();

    let mirror = {
        let upstream = upstream.clone();
        let parent = workspace_root.clone();
        tokio::task::spawn_blocking(move || Mirror::initialize(upstream, &parent))
            .await
            .context("Clone task failed")?
            .context("Failed to clone upstream")?
    };
    let mirror = Arc::new(mirror);

    let github = Arc::new(GitHubClient::new().context("Failed to create GitHub client")?);
    if !github.is_authenticated() {
        warn!("No GitHub token found; fork listing is subject to anonymous rate limits");
    }
    let forks = Arc::new(ForkCache::new());
    forks
        .refresh(github.as_ref(), &upstream.owner, &upstream.project)
        .await
        .context("Failed to list forks")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let source: Arc<dyn ForkSource> = github;
    let refresh = RefreshLoop::new(Arc::clone(&mirror), Arc::clone(&forks), source, &config.refresh)
        .spawn(shutdown_rx);

    let builder = Arc::new(ScriptBuilder::from_config(&config.build));
    let pipeline = BuildPipeline::new(Arc::clone(&mirror), builder, workspace_root)
        .with_max_artifact_bytes(config.build.max_artifact_bytes);
    let resolver = RefResolver::new(Arc::clone(&mirror), config.upstream.tag_prefixes.clone());
    let state = AppState::new(forks, resolver, pipeline, config.server.index_path.clone());

    let listener = tokio::net::TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("Failed to listen on {}", config.server.listen))?;

    server::serve(listener, state, shutdown_signal()).await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = refresh.await {
        warn!("Refresh loop ended abnormally: {}", e);
    }

    match Arc::try_unwrap(mirror) {
        Ok(mirror) => {
            let root = mirror.root().to_path_buf();
            drop(mirror);
            info!(path = %root.display(), "Removed mirror");
        }
        Err(_) => warn!("Mirror still in use at shutdown; it will be removed on exit"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutting down");
}
