//! Shared state handed to every handler

use std::path::PathBuf;
use std::sync::Arc;

use hatch_core::{BuildPipeline, ForkCache, RefResolver};

#[derive(Clone)]
pub struct AppState {
    pub forks: Arc<ForkCache>,
    pub resolver: Arc<RefResolver>,
    pub pipeline: Arc<BuildPipeline>,
    /// Static landing page served at `/`
    pub index_path: Arc<PathBuf>,
}

impl AppState {
    pub fn new(
        forks: Arc<ForkCache>,
        resolver: RefResolver,
        pipeline: BuildPipeline,
        index_path: PathBuf,
    ) -> Self {
        Self {
            forks,
            resolver: Arc::new(resolver),
            pipeline: Arc::new(pipeline),
            index_path: Arc::new(index_path),
        }
    }
}
