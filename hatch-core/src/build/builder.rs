//! The external build step

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::BuildConfig;
use crate::{Error, Result};

/// Number of stderr lines kept in build errors
const STDERR_TAIL_LINES: usize = 20;

/// Turns a checked-out source tree into an artifact
#[async_trait]
pub trait Builder: Send + Sync {
    /// Build inside `work_dir` and return the path of the produced artifact
    async fn build(&self, work_dir: &Path) -> Result<PathBuf>;
}

/// Runs a script from the checked-out tree and picks up a fixed output file
#[derive(Debug, Clone)]
pub struct ScriptBuilder {
    command: Vec<String>,
    artifact: PathBuf,
    timeout: Duration,
}

impl ScriptBuilder {
    pub fn new(command: Vec<String>, artifact: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            command,
            artifact: artifact.into(),
            timeout,
        }
    }

    pub fn from_config(config: &BuildConfig) -> Self {
        Self::new(config.command.clone(), config.artifact.clone(), config.timeout)
    }

    /// Relative programs such as `./build.sh` live in the workspace, not our cwd
    fn program_path(program: &str, work_dir: &Path) -> PathBuf {
        let path = Path::new(program);
        if path.is_relative() && path.components().count() > 1 {
            work_dir.join(path)
        } else {
            path.to_path_buf()
        }
    }
}

#[async_trait]
impl Builder for ScriptBuilder {
    async fn build(&self, work_dir: &Path) -> Result<PathBuf> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| Error::Config("build command is empty".to_string()))?;
        let program = Self::program_path(program, work_dir);

        debug!(program = %program.display(), work_dir = %work_dir.display(), "Starting build");

        let mut cmd = Command::new(&program);
        cmd.args(args)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(output) => output.map_err(|e| {
                Error::BuildLaunch(format!("{}: {}", program.display(), e))
            })?,
            Err(_) => {
                return Err(Error::Timeout(format!(
                    "build did not finish within {:?}",
                    self.timeout
                )))
            }
        };

        if !output.status.success() {
            return Err(Error::Build {
                code: output.status.code(),
                stderr_tail: tail_lines(&output.stderr, STDERR_TAIL_LINES),
            });
        }

        let artifact = work_dir.join(&self.artifact);
        if !artifact.is_file() {
            return Err(Error::Artifact(format!(
                "build succeeded but did not produce {}",
                self.artifact.display()
            )));
        }

        info!(artifact = %artifact.display(), "Build finished");
        Ok(artifact)
    }
}

/// The last `n` lines of a process output stream
fn tail_lines(output: &[u8], n: usize) -> String {
    let text = String::from_utf8_lossy(output);
    let lines: Vec<&str> = text.trim_end().lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}
