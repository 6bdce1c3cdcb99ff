mod conversation_store;
mod stream_consumer;
mod stream_relay;

pub use conversation_store::{ConversationStore, HISTORY_STORAGE_KEY};
pub use stream_consumer::{
    ConnectionStatus, ConsumerError, ExchangeOutcome, RejectReason, StreamConsumer,
};
pub use stream_relay::{DEFAULT_FALLBACK_MESSAGE, RelayStream, StreamRelay, degraded_stream};
