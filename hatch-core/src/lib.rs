//! Hatch Core - mirror and build orchestration for egg-hatcher
//!
//! This crate keeps one local mirror of the upstream repository, lists the
//! branches and tags of the upstream and its forks, caches the fork list,
//! and builds eggs from isolated copies of the mirror.

pub mod build;
pub mod config;
pub mod error;
pub mod forks;
pub mod git;
pub mod refresh;

pub use build::{Artifact, BuildPipeline, BuildTarget, Builder, ScriptBuilder};
pub use config::{CliOverrides, Config};
pub use error::{Error, Result};
pub use forks::{ForkCache, ForkEntry, ForkInfo, ForkSnapshot, ForkSource};
pub use git::{Mirror, RefResolver, UpstreamRepo};
pub use refresh::{RefreshLoop, TickOutcome};
