use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::domain::DocumentSource;
use crate::protocol::ChatRequest;

/// Events in the generation service's native vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEvent {
    Status(String),
    Content(String),
    Sources(Vec<DocumentSource>),
    Error(String),
    Done,
}

pub type UpstreamEventStream =
    Pin<Box<dyn Stream<Item = Result<UpstreamEvent, AnswerGeneratorError>> + Send + 'static>>;

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate_stream(
        &self,
        request: &ChatRequest,
    ) -> Result<UpstreamEventStream, AnswerGeneratorError>;

    async fn health(&self) -> Result<(), AnswerGeneratorError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AnswerGeneratorError {
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
    #[error("api request failed: {0}")]
    ApiRequestFailed(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}
