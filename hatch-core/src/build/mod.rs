//! Isolated checkout-and-build of eggs

mod builder;
mod pipeline;

pub use builder::{Builder, ScriptBuilder};
pub use pipeline::{egg_filename, Artifact, BuildPipeline, BuildTarget, EGG_CONTENT_TYPE};
