//! Vigil node entry point
//!
//! Starts one member of a supervision group:
//!
//! ```text
//! vigil-node <group.json> <index>
//! ```
//!
//! The process runs two independent units: the supervision loop (which keeps
//! the rest of the group alive) and the heartbeat responder (which lets
//! external monitors see this node). Ctrl-c stops both.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vigil_core::{FileLivenessStore, NodeConfig, GROUP_SIZE};
use vigil_supervisor::{ScriptLauncher, Supervisor, SupervisorConfig};

fn parse_args() -> Option<(PathBuf, usize)> {
    let mut args = std::env::args().skip(1);
    let config_path = PathBuf::from(args.next()?);
    let index: usize = args.next()?.parse().ok()?;

    if args.next().is_some() || index >= GROUP_SIZE {
        return None;
    }
    Some((config_path, index))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let Some((config_path, self_index)) = parse_args() else {
        eprintln!("usage: vigil-node <group.json> <0-{}>", GROUP_SIZE - 1);
        return ExitCode::from(2);
    };

    match run(config_path, self_index) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "node terminated");
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn run(config_path: PathBuf, self_index: usize) -> Result<()> {
    let identity =
        NodeConfig::load(&config_path, self_index).context("could not load group configuration")?;
    info!(node = %identity, guid = identity.guid(), "node starting");

    // Liveness records live next to the shared group file, where every
    // member of the group can reach them.
    let store_dir = match config_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let store =
        Arc::new(FileLivenessStore::open(store_dir).context("could not open liveness store")?);

    let cancel = CancellationToken::new();
    let supervisor = Supervisor::new(
        identity.clone(),
        store,
        Arc::new(ScriptLauncher::new()),
        SupervisorConfig::default(),
    );

    let mut heartbeat = tokio::spawn({
        let identity = identity.clone();
        let cancel = cancel.clone();
        async move { vigil_api::serve(&identity, cancel).await }
    });

    let outcome = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
            Ok(())
        }
        result = supervisor.run(cancel.clone()) => result,
        result = &mut heartbeat => {
            result.unwrap_or_else(|e| Err(anyhow!("heartbeat task panicked: {e}")))
        }
    };

    cancel.cancel();
    if !heartbeat.is_finished() {
        heartbeat
            .await
            .map_err(|e| anyhow!("heartbeat task panicked: {e}"))??;
    }
    outcome
}
