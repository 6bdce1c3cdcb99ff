use std::convert::Infallible;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use serde::Serialize;

use crate::application::ports::AnswerGenerator;
use crate::infrastructure::observability::sanitize_question;
use crate::presentation::state::AppState;
use crate::protocol::ChatRequest;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ChatError,
}

#[derive(Serialize)]
pub struct ChatError {
    pub message: String,
    pub r#type: String,
}

/// Streams the answer to one question as `data:` frames.
#[tracing::instrument(
    skip(state, request),
    fields(history = request.conversation_history.len())
)]
pub async fn chat_handler<G>(
    State(state): State<AppState<G>>,
    Json(request): Json<ChatRequest>,
) -> Response
where
    G: AnswerGenerator + 'static,
{
    tracing::debug!(question = %sanitize_question(&request.question), "Relaying question");

    if request.question.trim().is_empty() {
        tracing::warn!("Chat request with empty question");
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: ChatError {
                    message: "No question provided".to_string(),
                    r#type: "invalid_request_error".to_string(),
                },
            }),
        )
            .into_response();
    }

    let frames = state.stream_relay.relay(request).await;

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(frames.map(Ok::<_, Infallible>)),
    )
        .into_response()
}
