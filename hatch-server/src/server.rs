//! Router and listener

use std::future::Future;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers;
use crate::state::AppState;

/// All routes, GET only
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/fork", get(handlers::list_forks))
        .route("/fork/:forkname/branch", get(handlers::list_fork_branches))
        .route("/fork/:forkname/branch/:name", get(handlers::build_fork_branch))
        .route("/branch", get(handlers::list_branches))
        .route("/branch/:name", get(handlers::build_branch))
        .route("/tag", get(handlers::list_tags))
        .route("/tag/:name", get(handlers::build_tag))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves, then let in-flight requests finish
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!("egg-hatcher now accepting connections on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
