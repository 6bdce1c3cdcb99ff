use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::Router;
use bytes::Bytes;
use futures::channel::mpsc;
use futures::stream;

use bullpen::application::ports::{
    AnswerGenerator, AnswerGeneratorError, ByteStream, ChatTransport, KeyValueStore, StorageError,
    TransportError, UpstreamEvent, UpstreamEventStream,
};
use bullpen::application::services::ConversationStore;
use bullpen::domain::Message;
use bullpen::infrastructure::storage::MemoryKeyValueStore;
use bullpen::protocol::ChatRequest;

pub const TEST_STORAGE_KEY: &str = "chat_history";

pub type ChunkSender = mpsc::UnboundedSender<Result<Bytes, TransportError>>;

pub fn token_frame(text: &str) -> Bytes {
    Bytes::from(format!("data: {{\"token\":{}}}\n\n", serde_json::to_string(text).unwrap()))
}

pub fn done_frame(answer: Option<&str>) -> Bytes {
    match answer {
        Some(answer) => Bytes::from(format!(
            "data: {{\"done\":true,\"answer\":{}}}\n\n",
            serde_json::to_string(answer).unwrap()
        )),
        None => Bytes::from_static(b"data: {\"done\":true}\n\n"),
    }
}

/// Transport that hands out pre-arranged streams in order.
#[derive(Default)]
pub struct ScriptedTransport {
    streams: Mutex<VecDeque<Result<ByteStream, TransportError>>>,
    requests: Mutex<Vec<ChatRequest>>,
    unhealthy: bool,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unhealthy() -> Self {
        Self {
            unhealthy: true,
            ..Self::default()
        }
    }

    pub fn push_chunks(&self, chunks: Vec<Bytes>) {
        let stream = stream::iter(chunks.into_iter().map(Ok::<Bytes, TransportError>));
        self.streams.lock().unwrap().push_back(Ok(Box::pin(stream)));
    }

    /// A stream fed by the returned sender; it stays open until the sender drops.
    pub fn push_channel(&self) -> ChunkSender {
        let (tx, rx) = mpsc::unbounded();
        self.streams.lock().unwrap().push_back(Ok(Box::pin(rx)));
        tx
    }

    pub fn push_error(&self, error: TransportError) {
        self.streams.lock().unwrap().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ChatTransport for ScriptedTransport {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        self.streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::ConnectionFailed("no stream".to_string())))
    }

    async fn health(&self) -> Result<(), TransportError> {
        if self.unhealthy {
            Err(TransportError::ConnectionFailed("refused".to_string()))
        } else {
            Ok(())
        }
    }
}

pub enum GeneratorScript {
    Events(Vec<Result<UpstreamEvent, AnswerGeneratorError>>),
    Unreachable,
}

/// Generation service stand-in that replays one script per request.
pub struct FakeAnswerGenerator {
    script: Mutex<VecDeque<GeneratorScript>>,
    requests: Mutex<Vec<ChatRequest>>,
    healthy: bool,
}

impl FakeAnswerGenerator {
    pub fn new(scripts: Vec<GeneratorScript>) -> Self {
        Self {
            script: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
            healthy: true,
        }
    }

    pub fn with_events(events: Vec<UpstreamEvent>) -> Self {
        Self::new(vec![GeneratorScript::Events(
            events.into_iter().map(Ok).collect(),
        )])
    }

    pub fn unreachable() -> Self {
        Self {
            healthy: false,
            ..Self::new(vec![GeneratorScript::Unreachable])
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AnswerGenerator for FakeAnswerGenerator {
    async fn generate_stream(
        &self,
        request: &ChatRequest,
    ) -> Result<UpstreamEventStream, AnswerGeneratorError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.script.lock().unwrap().pop_front() {
            Some(GeneratorScript::Events(events)) => Ok(Box::pin(stream::iter(events))),
            Some(GeneratorScript::Unreachable) | None => Err(AnswerGeneratorError::Unavailable(
                "connection refused".to_string(),
            )),
        }
    }

    async fn health(&self) -> Result<(), AnswerGeneratorError> {
        if self.healthy {
            Ok(())
        } else {
            Err(AnswerGeneratorError::Unavailable("connection refused".to_string()))
        }
    }
}

/// Storage that keeps every snapshot written to it.
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryKeyValueStore,
    writes: Mutex<Vec<String>>,
}

impl RecordingStore {
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }
}

impl KeyValueStore for RecordingStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.writes.lock().unwrap().push(value.to_string());
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key)
    }
}

/// Storage whose every operation fails.
pub struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::WriteFailed("disk unavailable".to_string()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::WriteFailed("disk unavailable".to_string()))
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::WriteFailed("disk unavailable".to_string()))
    }
}

pub fn memory_store() -> Arc<Mutex<ConversationStore>> {
    let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
    Arc::new(Mutex::new(ConversationStore::load(storage, TEST_STORAGE_KEY)))
}

pub fn snapshot(store: &Arc<Mutex<ConversationStore>>) -> Vec<Message> {
    store.lock().unwrap().messages().to_vec()
}

pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Address nothing listens on.
pub async fn closed_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
