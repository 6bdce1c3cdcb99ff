use std::time::Duration;

use async_trait::async_trait;

use crate::application::ports::{
    AnswerGenerator, AnswerGeneratorError, UpstreamEvent, UpstreamEventStream,
};
use crate::domain::DocumentSource;
use crate::protocol::ChatRequest;

/// Echoes the question back as a streamed answer, for working on the front
/// end without a generation service.
pub struct ScaffoldAnswerGenerator {
    token_delay: Duration,
}

impl ScaffoldAnswerGenerator {
    pub fn new(token_delay: Duration) -> Self {
        Self { token_delay }
    }
}

#[async_trait]
impl AnswerGenerator for ScaffoldAnswerGenerator {
    async fn generate_stream(
        &self,
        request: &ChatRequest,
    ) -> Result<UpstreamEventStream, AnswerGeneratorError> {
        tracing::info!("Scaffold: echoing question");
        let question = request.question.clone();
        let token_delay = self.token_delay;

        let events = async_stream::stream! {
            yield Ok(UpstreamEvent::Status("Scaffold mode: echoing your question".to_string()));

            let echo = format!("Echo: {}", question);
            for (index, word) in echo.split_whitespace().enumerate() {
                if !token_delay.is_zero() {
                    tokio::time::sleep(token_delay).await;
                }
                let token = if index == 0 { word.to_string() } else { format!(" {}", word) };
                yield Ok(UpstreamEvent::Content(token));
            }

            let source = DocumentSource::new("scaffold", question.clone(), 1.0)
                .with_metadata("query_used", question);
            yield Ok(UpstreamEvent::Sources(vec![source]));
            yield Ok(UpstreamEvent::Done);
        };

        Ok(Box::pin(events))
    }

    async fn health(&self) -> Result<(), AnswerGeneratorError> {
        Ok(())
    }
}
