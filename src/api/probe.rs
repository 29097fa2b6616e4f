use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::api::AppState;
use crate::probe::sweep;

#[derive(Debug, Deserialize)]
pub struct ProbeParams {
    pub limit: Option<i64>,
}

/// Dispatch a probe sweep in the background and return immediately.
pub async fn probe_now(
    State(state): State<AppState>,
    Query(params): Query<ProbeParams>,
) -> Response {
    let ctx = state.ctx.clone();
    let limit = params.limit;
    tokio::spawn(async move {
        if let Err(e) = sweep::probe_all(&ctx, limit).await {
            tracing::error!(error = %e, "background probe sweep failed");
        }
    });
    tracing::info!(limit = ?limit, "probe sweep scheduled");

    let mut body = json!({"status": "scheduled", "message": "probe sweep dispatched"});
    if let Some(limit) = limit {
        body["limit"] = json!(limit);
    }
    (StatusCode::ACCEPTED, Json(body)).into_response()
}
