use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;

use crate::application::ports::{
    AnswerGenerator, AnswerGeneratorError, UpstreamEvent, UpstreamEventStream,
};
use crate::domain::StreamEvent;
use crate::protocol::{ChatRequest, encode, encode_done_sentinel};

pub const DEFAULT_FALLBACK_MESSAGE: &str = "I apologize, but I can't reach the answer service right now. \
     Please check that the backend is running and try again in a moment.";

pub type RelayStream = BoxStream<'static, Bytes>;

/// Forwards a question to the generation service and re-encodes its events
/// into the public frame format as they arrive.
pub struct StreamRelay<G>
where
    G: AnswerGenerator,
{
    generator: Arc<G>,
    max_history: usize,
    fallback_message: String,
    fallback_token_delay: Duration,
}

impl<G> StreamRelay<G>
where
    G: AnswerGenerator + 'static,
{
    pub fn new(
        generator: Arc<G>,
        max_history: usize,
        fallback_message: String,
        fallback_token_delay: Duration,
    ) -> Self {
        let fallback_message = if fallback_message.trim().is_empty() {
            DEFAULT_FALLBACK_MESSAGE.to_string()
        } else {
            fallback_message
        };
        Self {
            generator,
            max_history,
            fallback_message,
            fallback_token_delay,
        }
    }

    /// Opens the upstream stream and returns the translated frames.
    ///
    /// Falls back to a synthesized stream when the upstream cannot be reached
    /// or fails before its first event. Failures after that truncate the
    /// output.
    #[tracing::instrument(skip(self, request), fields(history = request.conversation_history.len()))]
    pub async fn relay(&self, request: ChatRequest) -> RelayStream {
        let request = request.bounded(self.max_history);

        let mut upstream = match self.generator.generate_stream(&request).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "Upstream unreachable, serving degraded stream");
                return self.degraded_stream();
            }
        };

        match upstream.next().await {
            Some(Ok(first)) => translate(first, upstream),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Upstream failed before first event, serving degraded stream");
                self.degraded_stream()
            }
            None => {
                tracing::warn!("Upstream closed without events, serving degraded stream");
                self.degraded_stream()
            }
        }
    }

    pub async fn upstream_health(&self) -> Result<(), AnswerGeneratorError> {
        self.generator.health().await
    }

    pub fn degraded_stream(&self) -> RelayStream {
        degraded_stream(self.fallback_message.clone(), self.fallback_token_delay)
    }
}

fn translate(first: UpstreamEvent, mut upstream: UpstreamEventStream) -> RelayStream {
    Box::pin(async_stream::stream! {
        let mut pending = Some(first);
        let mut frames: usize = 0;

        loop {
            let next = match pending.take() {
                Some(event) => Some(Ok(event)),
                None => upstream.next().await,
            };

            match next {
                Some(Ok(UpstreamEvent::Done)) | None => {
                    tracing::info!(frames, "Upstream stream complete");
                    yield encode(&StreamEvent::done());
                    yield encode_done_sentinel();
                    break;
                }
                Some(Ok(event)) => {
                    frames += 1;
                    yield encode(&to_stream_event(event));
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, frames, "Upstream failed mid-stream, truncating");
                    break;
                }
            }
        }
    })
}

fn to_stream_event(event: UpstreamEvent) -> StreamEvent {
    match event {
        UpstreamEvent::Status(text) => StreamEvent::Status(text),
        UpstreamEvent::Content(text) => StreamEvent::Token(text),
        UpstreamEvent::Sources(sources) => StreamEvent::Sources(sources),
        // The backend phrases its own failures for the reader.
        UpstreamEvent::Error(text) => StreamEvent::Token(text),
        UpstreamEvent::Done => StreamEvent::done(),
    }
}

/// Word-by-word rendition of `message`, paced like a live answer, closed by a
/// `Done` carrying the full text and an empty source list.
pub fn degraded_stream(message: String, token_delay: Duration) -> RelayStream {
    Box::pin(async_stream::stream! {
        for (index, word) in message.split_whitespace().enumerate() {
            if index > 0 {
                tokio::time::sleep(token_delay).await;
            }
            let token = if index == 0 {
                word.to_string()
            } else {
                format!(" {}", word)
            };
            yield encode(&StreamEvent::Token(token));
        }

        yield encode(&StreamEvent::Done {
            answer: Some(message),
            sources: Some(Vec::new()),
        });
        yield encode_done_sentinel();
    })
}
