use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Serialize;

use crate::application::ports::{
    AnswerGenerator, AnswerGeneratorError, UpstreamEvent, UpstreamEventStream,
};
use crate::presentation::config::UpstreamSettings;
use crate::protocol::{ChatRequest, HistoryEntry};

use super::UpstreamDecoder;

/// Talks to the generation service over HTTP and decodes its event stream.
pub struct HttpAnswerGenerator {
    client: Client,
    chat_url: String,
    health_url: String,
}

#[derive(Serialize)]
struct UpstreamChatRequest<'a> {
    message: &'a str,
    conversation_history: &'a [HistoryEntry],
}

impl HttpAnswerGenerator {
    pub fn new(settings: &UpstreamSettings) -> Result<Self, AnswerGeneratorError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .build()
            .map_err(|e| AnswerGeneratorError::Unavailable(e.to_string()))?;
        let base_url = settings.base_url.trim_end_matches('/');

        Ok(Self {
            client,
            chat_url: format!("{}{}", base_url, settings.chat_path),
            health_url: format!("{}{}", base_url, settings.health_path),
        })
    }
}

#[async_trait]
impl AnswerGenerator for HttpAnswerGenerator {
    async fn generate_stream(
        &self,
        request: &ChatRequest,
    ) -> Result<UpstreamEventStream, AnswerGeneratorError> {
        let body = UpstreamChatRequest {
            message: &request.question,
            conversation_history: &request.conversation_history,
        };

        let response = self
            .client
            .post(&self.chat_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnswerGeneratorError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AnswerGeneratorError::ApiRequestFailed(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let mut bytes = Box::pin(response.bytes_stream());
        let events = async_stream::stream! {
            let mut decoder = UpstreamDecoder::new();
            'read: while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(chunk) => {
                        for event in decoder.push(&chunk) {
                            let done = event == UpstreamEvent::Done;
                            yield Ok(event);
                            if done {
                                break 'read;
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(AnswerGeneratorError::ApiRequestFailed(e.to_string()));
                        break 'read;
                    }
                }
            }
            for event in decoder.finish() {
                yield Ok(event);
            }
        };

        Ok(Box::pin(events))
    }

    async fn health(&self) -> Result<(), AnswerGeneratorError> {
        let response = self
            .client
            .get(&self.health_url)
            .send()
            .await
            .map_err(|e| AnswerGeneratorError::Unavailable(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AnswerGeneratorError::ApiRequestFailed(format!(
                "HTTP {}",
                response.status()
            )))
        }
    }
}
