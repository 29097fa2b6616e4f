use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::api::AppState;
use crate::scan::{self, ScanError};
use crate::validate::is_valid_apex;

#[derive(Debug, Deserialize)]
pub struct DomainInput {
    pub domain: String,
}

/// Accept an apex, reserve it, register its daily job, and dispatch the
/// scan in the background.
pub async fn subdomain_search(
    State(state): State<AppState>,
    Json(req): Json<DomainInput>,
) -> Response {
    if !is_valid_apex(&req.domain) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": format!("invalid domain: {}", req.domain)})),
        )
            .into_response();
    }
    let apex = req.domain.trim().to_lowercase();

    match scan::start_scan(state.ctx.clone(), &state.scheduler, &apex, false).await {
        Ok(_handles) => (
            StatusCode::OK,
            Json(json!({"status": format!("scan initiated for domain {apex}")})),
        )
            .into_response(),
        Err(ScanError::InProgress(expires_at)) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"detail": format!("scan already scheduled until {expires_at}")})),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(apex = %apex, error = %e, "scan dispatch failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"detail": e.to_string()})),
            )
                .into_response()
        }
    }
}
