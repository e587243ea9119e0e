use axum::{extract::State, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::reconcile::{Fingerprint, OutcomeSummary};

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    pub generation: Option<i64>,
    pub fingerprint: Option<Fingerprint>,
    pub last_outcome: Option<OutcomeSummary>,
}

pub async fn get_healthz() -> &'static str {
    "ok"
}

pub async fn get_status(State(state): State<AdminState>) -> Json<StatusResponse> {
    let status = state.reconciler.status();
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        generation: status.generation,
        fingerprint: status.fingerprint,
        last_outcome: status.last_outcome.clone(),
    })
}
