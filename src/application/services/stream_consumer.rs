use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{ChatTransport, TransportError};
use crate::domain::{Message, MessageId, MessageRole, StreamEvent, reduce};
use crate::protocol::{ChatRequest, FrameDecoder};

use super::ConversationStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Busy,
    EmptyQuestion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// A `Done` event finalized the answer.
    Completed,
    /// The transport ended the stream before any `Done` or answer content.
    Closed,
    Cancelled,
    Rejected(RejectReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    #[error("could not reach the chat service: {0}")]
    Connection(TransportError),
    #[error("answer interrupted: {0}")]
    Interrupted(TransportError),
}

/// Drives one exchange at a time: sends the question, folds the decoded
/// events into the assistant message and publishes every step to the store.
pub struct StreamConsumer<T>
where
    T: ChatTransport,
{
    transport: Arc<T>,
    store: Arc<Mutex<ConversationStore>>,
    history_window: usize,
    busy: AtomicBool,
    status: Mutex<Option<String>>,
    active: Mutex<Option<CancellationToken>>,
}

impl<T> StreamConsumer<T>
where
    T: ChatTransport,
{
    pub fn new(
        transport: Arc<T>,
        store: Arc<Mutex<ConversationStore>>,
        history_window: usize,
    ) -> Self {
        Self {
            transport,
            store,
            history_window,
            busy: AtomicBool::new(false),
            status: Mutex::new(None),
            active: Mutex::new(None),
        }
    }

    pub async fn send(&self, question: &str) -> Result<ExchangeOutcome, ConsumerError> {
        self.send_with(question, CancellationToken::new()).await
    }

    /// Runs one exchange under `cancel`. The token belongs to this exchange
    /// only and must not be reused.
    #[tracing::instrument(skip(self, question, cancel), fields(question_len = question.len()))]
    pub async fn send_with(
        &self,
        question: &str,
        cancel: CancellationToken,
    ) -> Result<ExchangeOutcome, ConsumerError> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(ExchangeOutcome::Rejected(RejectReason::EmptyQuestion));
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Exchange already in flight, rejecting send");
            return Ok(ExchangeOutcome::Rejected(RejectReason::Busy));
        }
        *lock(&self.active) = Some(cancel.clone());
        let _flight = FlightGuard {
            busy: &self.busy,
            active: &self.active,
        };

        let (request, placeholder) = self.begin_exchange(question);

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.transport.open_stream(&request) => Some(result),
        };
        let mut stream = match opened {
            None => return Ok(self.stop_cancelled(placeholder)),
            Some(Err(e)) => return Err(self.roll_back(&placeholder, e)),
            Some(Ok(stream)) => stream,
        };

        let mut decoder = FrameDecoder::new();
        let mut message = placeholder;
        let mut received_content = false;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(self.stop_cancelled(message)),
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    for event in decoder.push(&chunk) {
                        if cancel.is_cancelled() {
                            return Ok(self.stop_cancelled(message));
                        }
                        if let StreamEvent::Status(text) = &event {
                            self.set_status(Some(text.clone()));
                            continue;
                        }

                        received_content = true;
                        let done = event.is_done();
                        message = reduce(message, &event);
                        self.publish(&message);

                        if done {
                            self.set_status(None);
                            tracing::info!(
                                message_id = %message.id,
                                answer_len = message.content.len(),
                                "Exchange completed"
                            );
                            return Ok(ExchangeOutcome::Completed);
                        }
                    }
                }
                Some(Err(e)) if received_content => {
                    return Err(self.interrupt(message, e));
                }
                Some(Err(e)) => return Err(self.roll_back(&message, e)),
                None if received_content => {
                    return Err(self.interrupt(
                        message,
                        TransportError::StreamInterrupted(
                            "stream ended before the answer completed".to_string(),
                        ),
                    ));
                }
                None => {
                    self.set_status(None);
                    message.streaming = false;
                    self.publish(&message);
                    tracing::info!(message_id = %message.id, "Stream closed without Done");
                    return Ok(ExchangeOutcome::Closed);
                }
            }
        }
    }

    /// Signals the in-flight exchange, if any, to stop at its next read.
    pub fn cancel(&self) {
        if let Some(token) = lock(&self.active).as_ref() {
            tracing::debug!("Cancelling in-flight exchange");
            token.cancel();
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Advisory status of the in-flight exchange, not part of any message.
    pub fn status(&self) -> Option<String> {
        lock(&self.status).clone()
    }

    /// Clears the conversation. Refused while an exchange is in flight.
    pub fn clear_history(&self) -> bool {
        if self.is_busy() {
            return false;
        }
        lock(&self.store).clear();
        true
    }

    /// Removes every error notice from the conversation and returns how many
    /// were dismissed.
    pub fn dismiss_errors(&self) -> usize {
        let mut store = lock(&self.store);
        let notices: Vec<MessageId> = store
            .messages()
            .iter()
            .filter(|m| m.is_error)
            .map(|m| m.id.clone())
            .collect();
        for id in &notices {
            store.remove(id);
        }
        notices.len()
    }

    pub fn store(&self) -> &Arc<Mutex<ConversationStore>> {
        &self.store
    }

    pub async fn check_health(&self) -> ConnectionStatus {
        match self.transport.health().await {
            Ok(()) => ConnectionStatus::Connected,
            Err(e) => {
                tracing::warn!(error = %e, "Health probe failed");
                ConnectionStatus::Disconnected
            }
        }
    }

    fn begin_exchange(&self, question: &str) -> (ChatRequest, Message) {
        let mut store = lock(&self.store);

        let mut context: Vec<Message> = store
            .messages()
            .iter()
            .rev()
            .filter(|m| is_context(m))
            .take(self.history_window)
            .cloned()
            .collect();
        context.reverse();
        let request = ChatRequest::new(question, &context);

        store.append(Message::user(question));
        let placeholder = Message::assistant_placeholder();
        store.upsert(placeholder.clone());
        drop(store);

        self.set_status(None);
        (request, placeholder)
    }

    fn stop_cancelled(&self, mut message: Message) -> ExchangeOutcome {
        self.set_status(None);
        message.streaming = false;
        self.publish(&message);
        tracing::info!(
            message_id = %message.id,
            partial_len = message.content.len(),
            "Exchange cancelled"
        );
        ExchangeOutcome::Cancelled
    }

    fn roll_back(&self, placeholder: &Message, error: TransportError) -> ConsumerError {
        tracing::error!(error = %error, "Exchange failed before any content, rolling back");
        self.set_status(None);
        let mut store = lock(&self.store);
        store.remove(&placeholder.id);
        store.append(Message::error(format!(
            "Could not reach the chat service ({}). Please try again.",
            error
        )));
        ConsumerError::Connection(error)
    }

    fn interrupt(&self, mut message: Message, error: TransportError) -> ConsumerError {
        tracing::error!(error = %error, message_id = %message.id, "Exchange interrupted mid-stream");
        self.set_status(None);
        message.streaming = false;
        let mut store = lock(&self.store);
        store.upsert(message);
        store.append(Message::error(format!(
            "The answer was interrupted ({}). The partial response is kept above.",
            error
        )));
        ConsumerError::Interrupted(error)
    }

    fn publish(&self, message: &Message) {
        lock(&self.store).upsert(message.clone());
    }

    fn set_status(&self, status: Option<String>) {
        *lock(&self.status) = status;
    }
}

/// Error notices and unfinished placeholders are not sent back as context.
fn is_context(message: &Message) -> bool {
    !message.is_error && !(message.role == MessageRole::Assistant && message.content.is_empty())
}

/// Releases single-flight state however the exchange ends, including when the
/// `send` future is dropped.
struct FlightGuard<'a> {
    busy: &'a AtomicBool,
    active: &'a Mutex<Option<CancellationToken>>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        lock(self.active).take();
        self.busy.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
