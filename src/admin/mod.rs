//! Local status surface.
//!
//! # Responsibilities
//! - `/healthz` for liveness probes
//! - `/status` with the last-applied generation, fingerprint and last outcome
//!
//! # Design Decisions
//! - Reads the published status through `arc-swap`; never waits on a reconciliation
//! - Bound to a local address only; no authentication

pub mod handlers;

use std::sync::Arc;
use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::reconcile::Reconciler;
use self::handlers::*;

/// State shared with the status handlers.
#[derive(Clone)]
pub struct AdminState {
    pub reconciler: Arc<Reconciler>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/healthz", get(get_healthz))
        .route("/status", get(get_status))
        .with_state(state)
}

/// Serve the status surface until the shutdown signal fires.
pub async fn serve(
    listener: TcpListener,
    reconciler: Arc<Reconciler>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Status endpoint listening");

    let app = setup_admin_router(AdminState { reconciler });
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    tracing::info!("Status endpoint stopped");
    Ok(())
}
