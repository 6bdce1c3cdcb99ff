mod answer_fold;
mod conversation;
mod document_source;
mod message;
mod message_id;
mod message_role;
mod stream_event;

pub use answer_fold::reduce;
pub use conversation::Conversation;
pub use document_source::DocumentSource;
pub use message::Message;
pub use message_id::MessageId;
pub use message_role::MessageRole;
pub use stream_event::StreamEvent;
