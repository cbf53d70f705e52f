//! Process launcher capability
//!
//! Resurrection means starting a new OS process for a dead peer. The launcher
//! is strictly fire-and-forget: it returns as soon as the operating system
//! accepts the spawn request, never waits for the child, never captures its
//! output. The spawned node rejoins the group on its own by refreshing its
//! liveness record.
//!
//! Implementations are interchangeable and chosen by injection, so the
//! supervisor itself carries no platform branches: `ScriptLauncher` for real
//! deployments, `NoopLauncher` for dry runs and tests.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::debug;

/// Everything a new peer process needs to rejoin its group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    pub peer_name: String,
    pub config_path: PathBuf,
    pub peer_index: usize,
}

impl fmt::Display for SpawnRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (index {})", self.peer_name, self.peer_index)
    }
}

/// Spawn failures; all of them are retryable on the next tick
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("could not start process: {0}")]
    Io(#[from] std::io::Error),
}

/// Fire-and-forget starter for peer processes
pub trait ProcessLauncher: Send + Sync {
    fn spawn(&self, request: &SpawnRequest) -> Result<(), SpawnError>;
}

/// Launches peers through a per-platform start script, handing it
/// `(peer_name, config_path, peer_index)` as positional arguments.
#[derive(Debug, Clone)]
pub struct ScriptLauncher {
    windows_script: PathBuf,
    unix_script: PathBuf,
}

impl ScriptLauncher {
    pub fn new() -> Self {
        Self {
            windows_script: PathBuf::from("start-node.cmd"),
            unix_script: PathBuf::from("start-node.sh"),
        }
    }

    /// Use custom start scripts instead of the defaults
    pub fn with_scripts(
        windows_script: impl Into<PathBuf>,
        unix_script: impl Into<PathBuf>,
    ) -> Self {
        Self {
            windows_script: windows_script.into(),
            unix_script: unix_script.into(),
        }
    }

    /// Map an operating system name to its invocation template. Resolved at
    /// spawn time, not startup, so an unsupported platform only fails the
    /// spawn attempt and the supervisor keeps running.
    fn command_for(&self, os: &str, request: &SpawnRequest) -> Result<Command, SpawnError> {
        let script: &Path = match os {
            "windows" => &self.windows_script,
            "linux" | "macos" => &self.unix_script,
            other => return Err(SpawnError::UnsupportedPlatform(other.to_string())),
        };

        let mut command = if os == "windows" {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(script);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg(script);
            c
        };

        command
            .arg(&request.peer_name)
            .arg(&request.config_path)
            .arg(request.peer_index.to_string());

        Ok(command)
    }
}

impl Default for ScriptLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessLauncher for ScriptLauncher {
    fn spawn(&self, request: &SpawnRequest) -> Result<(), SpawnError> {
        let mut command = self.command_for(std::env::consts::OS, request)?;

        // Detach stdio; the child reports through its own liveness record.
        let child = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        debug!(peer = %request.peer_name, pid = child.id(), "spawn accepted");
        drop(child);
        Ok(())
    }
}

/// Launcher that accepts every request without starting anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLauncher;

impl ProcessLauncher for NoopLauncher {
    fn spawn(&self, request: &SpawnRequest) -> Result<(), SpawnError> {
        debug!(peer = %request.peer_name, "noop launcher ignoring spawn");
        Ok(())
    }
}
