use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;

use crate::application::ports::{ByteStream, ChatTransport, TransportError};
use crate::protocol::ChatRequest;

/// Posts exchanges to the relay's `/chat` endpoint.
pub struct HttpChatTransport {
    client: Client,
    relay_url: String,
}

impl HttpChatTransport {
    pub fn new(relay_url: &str) -> Self {
        Self {
            client: Client::new(),
            relay_url: relay_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, TransportError> {
        let response = self
            .client
            .post(format!("{}/chat", self.relay_url))
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::UnexpectedStatus { status, body });
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::StreamInterrupted(e.to_string())));
        Ok(Box::pin(stream))
    }

    async fn health(&self) -> Result<(), TransportError> {
        let response = self
            .client
            .get(format!("{}/health", self.relay_url))
            .send()
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(TransportError::UnexpectedStatus { status, body })
        }
    }
}
