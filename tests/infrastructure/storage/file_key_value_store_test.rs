use std::sync::Arc;

use bullpen::application::ports::{KeyValueStore, StorageError};
use bullpen::application::services::ConversationStore;
use bullpen::domain::Message;
use bullpen::infrastructure::storage::FileKeyValueStore;
use tempfile::TempDir;

fn store_in(dir: &TempDir) -> FileKeyValueStore {
    FileKeyValueStore::new(dir.path().join("history")).unwrap()
}

#[test]
fn given_missing_directory_when_creating_store_then_directory_is_created() {
    let dir = TempDir::new().unwrap();

    let store = store_in(&dir);

    assert!(store.base_dir().is_dir());
}

#[test]
fn given_value_when_setting_then_it_is_written_to_key_file() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    store.set("chat_history", "[]").unwrap();

    let on_disk = std::fs::read_to_string(dir.path().join("history/chat_history.json")).unwrap();
    assert_eq!(on_disk, "[]");
    assert_eq!(store.get("chat_history").unwrap().as_deref(), Some("[]"));
}

#[test]
fn given_existing_value_when_setting_again_then_value_is_replaced() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.set("k", "old").unwrap();

    store.set("k", "new").unwrap();

    assert_eq!(store.get("k").unwrap().as_deref(), Some("new"));
    let files = std::fs::read_dir(store.base_dir()).unwrap().count();
    assert_eq!(files, 1);
}

#[test]
fn given_missing_key_when_getting_or_removing_then_nothing_fails() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    assert_eq!(store.get("absent").unwrap(), None);
    assert!(store.remove("absent").is_ok());
}

#[test]
fn given_stored_value_when_removing_then_it_is_gone() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.set("k", "v").unwrap();

    store.remove("k").unwrap();

    assert_eq!(store.get("k").unwrap(), None);
}

#[test]
fn given_key_with_path_separators_when_setting_then_key_is_rejected() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    for key in ["../escape", "a/b", "", ".hidden"] {
        assert!(
            matches!(store.set(key, "v"), Err(StorageError::InvalidKey(_))),
            "key {:?} should be rejected",
            key
        );
    }
}

#[test]
fn given_conversation_on_disk_when_reloading_in_new_store_then_history_is_restored() {
    let dir = TempDir::new().unwrap();
    let storage: Arc<dyn KeyValueStore> = Arc::new(store_in(&dir));
    let mut conversation = ConversationStore::load(storage, "chat_history");
    conversation.append(Message::user("What changed in Q3?"));
    conversation.upsert(Message::assistant_placeholder());

    let reopened: Arc<dyn KeyValueStore> = Arc::new(store_in(&dir));
    let restored = ConversationStore::load(reopened, "chat_history");

    assert_eq!(restored.len(), 2);
    assert_eq!(restored.messages()[0].content, "What changed in Q3?");
    assert!(!restored.messages()[1].streaming);
}
