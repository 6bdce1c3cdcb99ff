use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::application::ports::AnswerGenerator;
use crate::presentation::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub upstream: String,
}

/// Reports the relay as healthy only while the generation service answers
/// its own health probe.
pub async fn health_handler<G>(State(state): State<AppState<G>>) -> impl IntoResponse
where
    G: AnswerGenerator + 'static,
{
    match state.stream_relay.upstream_health().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                upstream: "connected".to_string(),
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Upstream health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded".to_string(),
                    upstream: "unavailable".to_string(),
                }),
            )
        }
    }
}
