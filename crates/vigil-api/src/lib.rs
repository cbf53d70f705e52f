//! Vigil Heartbeat API
//!
//! A read-only endpoint for external monitors:
//! `GET /heartbeat` returns this node's GUID and display name as JSON.
//!
//! The responder touches only immutable identity data fixed at startup, so it
//! runs fully independently of the supervision loop: it never blocks a tick
//! and a tick never blocks it.

use anyhow::{Context, Result};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;
use vigil_core::NodeIdentity;

/// Body of a heartbeat reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub guid: String,
    pub server: String,
}

#[derive(Clone)]
struct HeartbeatState {
    guid: String,
    server: String,
}

async fn get_heartbeat(State(state): State<HeartbeatState>) -> Json<HeartbeatResponse> {
    Json(HeartbeatResponse {
        guid: state.guid.clone(),
        server: state.server.clone(),
    })
}

/// Build the heartbeat router for `identity`
pub fn router(identity: &NodeIdentity) -> Router {
    Router::new()
        .route("/heartbeat", get(get_heartbeat))
        .layer(TraceLayer::new_for_http())
        .with_state(HeartbeatState {
            guid: identity.guid().to_string(),
            server: identity.self_name().to_string(),
        })
}

/// Serve the heartbeat endpoint on the identity's configured port until
/// `cancel` fires
pub async fn serve(identity: &NodeIdentity, cancel: CancellationToken) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], identity.listen_port()));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("could not bind heartbeat listener on {addr}"))?;

    info!(%addr, node = %identity.self_name(), "heartbeat responder listening");

    axum::serve(listener, router(identity))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .context("heartbeat responder failed")
}
