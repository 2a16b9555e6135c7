//! Request handlers

use axum::{
    extract::{Path, State},
    http::header,
    response::{Html, IntoResponse, Response},
    Json,
};
use hatch_core::build::{Artifact, BuildTarget};
use hatch_core::forks::ForkEntry;
use hatch_core::git::{BranchEntry, TagEntry, ORIGIN};
use tracing::info;

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

/// `GET /`
pub async fn index(State(state): State<AppState>) -> ServerResult<Html<String>> {
    let path = state.index_path.as_path();
    tokio::fs::read_to_string(path)
        .await
        .map(Html)
        .map_err(|source| ServerError::Index {
            path: path.display().to_string(),
            source,
        })
}

/// `GET /fork`
pub async fn list_forks(State(state): State<AppState>) -> Json<Vec<ForkEntry>> {
    Json(state.forks.get().entries.clone())
}

/// `GET /fork/:forkname/branch`
pub async fn list_fork_branches(
    State(state): State<AppState>,
    Path(forkname): Path<String>,
) -> ServerResult<Json<Vec<BranchEntry>>> {
    Ok(Json(state.resolver.branches(&forkname).await?))
}

/// `GET /branch`
pub async fn list_branches(State(state): State<AppState>) -> ServerResult<Json<Vec<BranchEntry>>> {
    Ok(Json(state.resolver.branches(ORIGIN).await?))
}

/// `GET /tag`
pub async fn list_tags(State(state): State<AppState>) -> ServerResult<Json<Vec<TagEntry>>> {
    Ok(Json(state.resolver.tags().await?))
}

/// `GET /fork/:forkname/branch/:name`
pub async fn build_fork_branch(
    State(state): State<AppState>,
    Path((forkname, name)): Path<(String, String)>,
) -> ServerResult<Response> {
    build(&state, BuildTarget::branch(forkname, name)).await
}

/// `GET /branch/:name`
pub async fn build_branch(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ServerResult<Response> {
    build(&state, BuildTarget::upstream_branch(name)).await
}

/// `GET /tag/:name`
pub async fn build_tag(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ServerResult<Response> {
    build(&state, BuildTarget::tag(name)).await
}

async fn build(state: &AppState, target: BuildTarget) -> ServerResult<Response> {
    let artifact = state.pipeline.build(&target).await?;
    info!(
        filename = %artifact.filename,
        bytes = artifact.content_length(),
        "Sending egg"
    );
    Ok(egg_response(artifact))
}

fn egg_response(artifact: Artifact) -> Response {
    (
        [
            (header::CONTENT_TYPE, artifact.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", artifact.filename),
            ),
            (header::CONTENT_LENGTH, artifact.content_length().to_string()),
        ],
        artifact.bytes,
    )
        .into_response()
}
