mod answer_generator;
mod chat_transport;
mod key_value_store;
mod storage_error;

pub use answer_generator::{
    AnswerGenerator, AnswerGeneratorError, UpstreamEvent, UpstreamEventStream,
};
pub use chat_transport::{ByteStream, ChatTransport, TransportError};
pub use key_value_store::KeyValueStore;
pub use storage_error::StorageError;
