//! Hatch GitHub - GitHub integration for egg-hatcher
//!
//! This crate enumerates the forks of the upstream repository through the
//! GitHub REST API and plugs into the fork cache as a `ForkSource`.

mod client;
mod error;
mod forks;
mod token;

pub use client::GitHubClient;
pub use error::{Error, Result};
pub use token::{GitHubSecrets, Secrets};
