use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};

use crate::models::{ReadyResponse, VersionResponse};
use crate::state::AppState;

/// Liveness; touches no dependency
pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let verdict = state.readiness.check_ready(state.readiness_timeout).await;

    let body = ReadyResponse {
        ready: verdict.overall,
        ledger: verdict.ledger_reachable,
        publisher: verdict.publisher_reachable,
        env: state.build.env.clone(),
        status: if verdict.overall { "ready" } else { "not-ready" },
    };
    let status = if verdict.overall {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

pub async fn version(State(state): State<AppState>) -> Json<VersionResponse> {
    Json(VersionResponse {
        version: state.build.version.clone(),
        git_sha: state.build.git_sha.clone(),
        build_ts: state.build.build_ts.clone(),
    })
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
