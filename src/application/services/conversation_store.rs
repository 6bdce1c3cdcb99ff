use std::sync::Arc;

use tokio::sync::watch;

use crate::application::ports::KeyValueStore;
use crate::domain::{Conversation, Message, MessageId};

/// Storage key of the persisted conversation.
pub const HISTORY_STORAGE_KEY: &str = "chat_history";

/// Single-writer owner of the conversation, persisted on every mutation.
///
/// Readers observe immutable snapshots through [`ConversationStore::subscribe`].
pub struct ConversationStore {
    conversation: Conversation,
    storage: Arc<dyn KeyValueStore>,
    key: String,
    snapshots: watch::Sender<Arc<[Message]>>,
}

impl ConversationStore {
    /// Rehydrates the conversation stored under `key`. Unreadable or corrupt
    /// data yields an empty conversation.
    pub fn load(storage: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let mut messages = read_messages(storage.as_ref(), &key);
        for message in messages.iter_mut().filter(|m| m.streaming) {
            message.streaming = false;
        }

        let conversation = Conversation::from_messages(messages);
        tracing::debug!(key = %key, messages = conversation.len(), "Conversation loaded");

        let (snapshots, _) = watch::channel(Arc::from(conversation.messages()));
        Self {
            conversation,
            storage,
            key,
            snapshots,
        }
    }

    /// Appends `message`, assigning a fresh id if its id is already taken.
    pub fn append(&mut self, mut message: Message) -> MessageId {
        if self.conversation.get(&message.id).is_some() {
            message.id = MessageId::new();
        }
        let id = message.id.clone();
        self.upsert(message);
        id
    }

    /// Replaces the message with the same id in place, or appends it.
    ///
    /// A streaming message supersedes any other message still marked
    /// streaming; those are marked complete.
    pub fn upsert(&mut self, message: Message) {
        if message.streaming {
            self.settle_other_streaming(&message.id);
        }
        self.conversation.upsert(message);
        self.commit();
    }

    pub fn remove(&mut self, id: &MessageId) -> Option<Message> {
        let removed = self.conversation.remove(id);
        if removed.is_some() {
            self.commit();
        }
        removed
    }

    /// Empties the conversation and its stored entry.
    pub fn clear(&mut self) {
        self.conversation.clear();
        if let Err(e) = self.storage.remove(&self.key) {
            tracing::warn!(error = %e, key = %self.key, "Failed to remove stored conversation");
        }
        self.publish();
    }

    /// The last `n` messages, oldest first.
    pub fn history(&self, n: usize) -> &[Message] {
        self.conversation.history(n)
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.conversation.get(id)
    }

    pub fn len(&self) -> usize {
        self.conversation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversation.is_empty()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<[Message]>> {
        self.snapshots.subscribe()
    }

    fn settle_other_streaming(&mut self, id: &MessageId) {
        let stale: Vec<Message> = self
            .conversation
            .messages()
            .iter()
            .filter(|m| m.streaming && &m.id != id)
            .cloned()
            .collect();
        for mut message in stale {
            tracing::warn!(message_id = %message.id, "Settling stale streaming message");
            message.streaming = false;
            self.conversation.upsert(message);
        }
    }

    fn commit(&self) {
        self.persist();
        self.publish();
    }

    fn persist(&self) {
        let snapshot = match serde_json::to_string(self.conversation.messages()) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize conversation");
                return;
            }
        };
        if let Err(e) = self.storage.set(&self.key, &snapshot) {
            tracing::warn!(error = %e, key = %self.key, "Failed to persist conversation, keeping it in memory");
        }
    }

    fn publish(&self) {
        self.snapshots
            .send_replace(Arc::from(self.conversation.messages()));
    }
}

fn read_messages(storage: &dyn KeyValueStore, key: &str) -> Vec<Message> {
    let raw = match storage.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            tracing::warn!(error = %e, key = %key, "Failed to read stored conversation, starting empty");
            return Vec::new();
        }
    };

    serde_json::from_str(&raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, key = %key, "Stored conversation is corrupt, starting empty");
        Vec::new()
    })
}
