use anyhow::{Result, anyhow};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const STORE_VERSION: u32 = 1;
const DEFAULT_TITLE: &str = "New Chat";
const TITLE_MAX_CHARS: usize = 40;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single chat message. Immutable once appended to a conversation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Conversation {
    pub id: i64,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: String,
    pub updated_at: String,
}

/// On-disk envelope. Versioned so a future format change can migrate
/// instead of silently misparsing.
#[derive(Serialize, Deserialize, Debug)]
struct StoreFile {
    version: u32,
    conversations: Vec<Conversation>,
}

/// Holds the conversation list, the active conversation pointer, and the
/// active message view. Every list mutation is written back to disk;
/// persistence is best-effort and never fatal.
pub struct SessionStore {
    conversations: Vec<Conversation>,
    active_id: Option<i64>,
    messages: Vec<Message>,
    path: PathBuf,
}

impl SessionStore {
    /// Open the store backed by `path`, reloading any previously persisted
    /// history. Missing or malformed data degrades to an empty list.
    pub fn open(path: PathBuf) -> Self {
        let conversations = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<StoreFile>(&raw) {
                Ok(file) if file.version == STORE_VERSION => file.conversations,
                Ok(file) => {
                    tracing::warn!(version = file.version, "unknown history version, starting empty");
                    Vec::new()
                }
                Err(e) => {
                    tracing::warn!(error = %e, "malformed chat history, starting empty");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };

        Self {
            conversations,
            active_id: None,
            messages: Vec::new(),
            path,
        }
    }

    /// Default history location: `<data_dir>/purityprop/chat_history.json`.
    pub fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?;
        Ok(data_dir.join("purityprop").join("chat_history.json"))
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn active_id(&self) -> Option<i64> {
        self.active_id
    }

    /// Messages of the active conversation, in append order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn active_title(&self) -> Option<&str> {
        let id = self.active_id?;
        self.conversations
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.title.as_str())
    }

    /// Create a new empty conversation at the head of the list and make it
    /// active. Returns the new id.
    pub fn create_conversation(&mut self) -> i64 {
        let now = Utc::now().to_rfc3339();
        let mut id = Utc::now().timestamp_millis();
        // Two creations in the same millisecond would collide; bump past
        // the newest existing id.
        if let Some(max) = self.conversations.iter().map(|c| c.id).max() {
            if id <= max {
                id = max + 1;
            }
        }

        self.conversations.insert(
            0,
            Conversation {
                id,
                title: DEFAULT_TITLE.to_string(),
                messages: Vec::new(),
                created_at: now.clone(),
                updated_at: now,
            },
        );
        self.active_id = Some(id);
        self.messages.clear();
        self.persist();
        id
    }

    /// Make `id` the active conversation and show its stored messages.
    /// Silent no-op if no such conversation exists.
    pub fn load_conversation(&mut self, id: i64) {
        if let Some(conv) = self.conversations.iter().find(|c| c.id == id) {
            self.messages = conv.messages.clone();
            self.active_id = Some(id);
        }
    }

    /// Stamp and append a message to the active conversation, mirroring it
    /// into the stored list entry. The first user message replaces the
    /// default title.
    pub fn append_message(&mut self, role: Role, content: String, language: Option<String>) {
        let message = Message {
            role,
            content,
            timestamp: Utc::now().to_rfc3339(),
            language,
        };

        self.messages.push(message.clone());

        let Some(active_id) = self.active_id else {
            return;
        };
        if let Some(conv) = self.conversations.iter_mut().find(|c| c.id == active_id) {
            if role == Role::User && conv.title == DEFAULT_TITLE {
                conv.title = derive_title(&message.content);
            }
            conv.messages.push(message);
            conv.updated_at = Utc::now().to_rfc3339();
            self.persist();
        }
    }

    /// Overwrite the title of the matching conversation; no-op if absent.
    pub fn rename_conversation(&mut self, id: i64, title: String) {
        if let Some(conv) = self.conversations.iter_mut().find(|c| c.id == id) {
            conv.title = title;
            self.persist();
        }
    }

    /// Remove a conversation. Deleting the active one clears the active
    /// pointer and the message view.
    pub fn delete_conversation(&mut self, id: i64) {
        let before = self.conversations.len();
        self.conversations.retain(|c| c.id != id);
        if self.conversations.len() == before {
            return;
        }
        if self.active_id == Some(id) {
            self.active_id = None;
            self.messages.clear();
        }
        self.persist();
    }

    /// Write the conversation list back to disk. The empty list is written
    /// too, so deleting the last conversation durably clears history.
    fn persist(&self) {
        let file = StoreFile {
            version: STORE_VERSION,
            conversations: self.conversations.clone(),
        };

        let result = (|| -> Result<()> {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            let raw = serde_json::to_string_pretty(&file)?;
            fs::write(&self.path, raw)?;
            Ok(())
        })();

        if let Err(e) = result {
            tracing::warn!(error = %e, path = %self.path.display(), "failed to persist chat history");
        }
    }
}

/// Title from the first user message: first 40 characters, with "..."
/// appended only when the content is actually longer.
fn derive_title(content: &str) -> String {
    let mut title: String = content.chars().take(TITLE_MAX_CHARS).collect();
    if content.chars().count() > TITLE_MAX_CHARS {
        title.push_str("...");
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &tempfile::TempDir) -> SessionStore {
        SessionStore::open(dir.path().join("chat_history.json"))
    }

    #[test]
    fn test_create_conversation_is_newest_and_active() {
        let dir = tempdir().unwrap();
        let mut store = store_in(&dir);

        let first = store.create_conversation();
        let second = store.create_conversation();

        assert_ne!(first, second);
        assert_eq!(store.conversations()[0].id, second);
        assert_eq!(store.conversations()[1].id, first);
        assert_eq!(store.active_id(), Some(second));
        assert!(store.messages().is_empty());
        assert_eq!(store.conversations()[0].title, "New Chat");
    }

    #[test]
    fn test_active_view_mirrors_stored_messages() {
        let dir = tempdir().unwrap();
        let mut store = store_in(&dir);

        let id = store.create_conversation();
        store.append_message(Role::User, "How many square feet is 5 cents?".into(), None);
        store.append_message(Role::Assistant, "5 cents is 2,178 square feet.".into(), Some("en".into()));
        store.append_message(Role::User, "And 10 cents?".into(), None);

        let stored = &store
            .conversations()
            .iter()
            .find(|c| c.id == id)
            .unwrap()
            .messages;
        assert_eq!(store.messages(), stored.as_slice());
        assert_eq!(stored.len(), 3);
    }

    #[test]
    fn test_title_derived_from_first_user_message() {
        let dir = tempdir().unwrap();
        let mut store = store_in(&dir);

        store.create_conversation();
        store.append_message(Role::User, "Short question".into(), None);
        assert_eq!(store.active_title(), Some("Short question"));

        // Later user messages must not retitle.
        store.append_message(Role::User, "A different follow-up question".into(), None);
        assert_eq!(store.active_title(), Some("Short question"));
    }

    #[test]
    fn test_title_truncated_at_forty_chars() {
        let dir = tempdir().unwrap();
        let mut store = store_in(&dir);

        // Exactly 40 characters: no ellipsis.
        let exact = "a".repeat(40);
        store.create_conversation();
        store.append_message(Role::User, exact.clone(), None);
        assert_eq!(store.active_title(), Some(exact.as_str()));

        // 41 characters: truncated with ellipsis.
        let long = "b".repeat(41);
        store.create_conversation();
        store.append_message(Role::User, long, None);
        assert_eq!(store.active_title(), Some(format!("{}...", "b".repeat(40)).as_str()));
    }

    #[test]
    fn test_title_truncation_counts_chars_not_bytes() {
        let dir = tempdir().unwrap();
        let mut store = store_in(&dir);

        // 41 multi-byte characters must still truncate to 40 chars.
        let tamil = "த".repeat(41);
        store.create_conversation();
        store.append_message(Role::User, tamil, None);
        assert_eq!(store.active_title(), Some(format!("{}...", "த".repeat(40)).as_str()));
    }

    #[test]
    fn test_assistant_message_does_not_set_title() {
        let dir = tempdir().unwrap();
        let mut store = store_in(&dir);

        store.create_conversation();
        store.append_message(Role::Assistant, "Welcome to PurityProp".into(), Some("en".into()));
        assert_eq!(store.active_title(), Some("New Chat"));

        store.append_message(Role::User, "Stamp duty rates".into(), None);
        assert_eq!(store.active_title(), Some("Stamp duty rates"));
    }

    #[test]
    fn test_load_conversation_switches_view() {
        let dir = tempdir().unwrap();
        let mut store = store_in(&dir);

        let first = store.create_conversation();
        store.append_message(Role::User, "first chat".into(), None);
        let second = store.create_conversation();
        store.append_message(Role::User, "second chat".into(), None);
        assert_eq!(store.active_id(), Some(second));

        store.load_conversation(first);
        assert_eq!(store.active_id(), Some(first));
        assert_eq!(store.messages().len(), 1);
        assert_eq!(store.messages()[0].content, "first chat");

        // Unknown id is a silent no-op.
        store.load_conversation(999);
        assert_eq!(store.active_id(), Some(first));
    }

    #[test]
    fn test_delete_active_clears_state() {
        let dir = tempdir().unwrap();
        let mut store = store_in(&dir);

        let id = store.create_conversation();
        store.append_message(Role::User, "hello".into(), None);
        store.delete_conversation(id);

        assert!(store.conversations().is_empty());
        assert_eq!(store.active_id(), None);
        assert!(store.messages().is_empty());
    }

    #[test]
    fn test_delete_non_active_keeps_active_state() {
        let dir = tempdir().unwrap();
        let mut store = store_in(&dir);

        let other = store.create_conversation();
        let active = store.create_conversation();
        store.append_message(Role::User, "keep me".into(), None);

        store.delete_conversation(other);
        assert_eq!(store.active_id(), Some(active));
        assert_eq!(store.messages().len(), 1);
    }

    #[test]
    fn test_rename_conversation() {
        let dir = tempdir().unwrap();
        let mut store = store_in(&dir);

        let id = store.create_conversation();
        store.rename_conversation(id, "Loan questions".into());
        assert_eq!(store.active_title(), Some("Loan questions"));

        // Unknown id is a silent no-op.
        store.rename_conversation(999, "nope".into());
        assert_eq!(store.active_title(), Some("Loan questions"));
    }

    #[test]
    fn test_history_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chat_history.json");

        let id = {
            let mut store = SessionStore::open(path.clone());
            let id = store.create_conversation();
            store.append_message(Role::User, "What documents do I need?".into(), None);
            id
        };

        let mut store = SessionStore::open(path);
        assert_eq!(store.conversations().len(), 1);
        assert_eq!(store.conversations()[0].title, "What documents do I need?");
        // Nothing is active after a fresh open.
        assert_eq!(store.active_id(), None);
        store.load_conversation(id);
        assert_eq!(store.messages().len(), 1);
    }

    #[test]
    fn test_deleting_last_conversation_persists_empty_list() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chat_history.json");

        let mut store = SessionStore::open(path.clone());
        let id = store.create_conversation();
        store.append_message(Role::User, "temporary".into(), None);
        store.delete_conversation(id);

        let reopened = SessionStore::open(path);
        assert!(reopened.conversations().is_empty());
    }

    #[test]
    fn test_malformed_history_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chat_history.json");
        fs::write(&path, "{ not json").unwrap();

        let store = SessionStore::open(path);
        assert!(store.conversations().is_empty());
    }

    #[test]
    fn test_unknown_version_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chat_history.json");
        fs::write(&path, r#"{"version": 99, "conversations": []}"#).unwrap();

        let store = SessionStore::open(path);
        assert!(store.conversations().is_empty());
    }

    #[test]
    fn test_append_without_active_conversation_only_updates_view() {
        let dir = tempdir().unwrap();
        let mut store = store_in(&dir);

        store.append_message(Role::User, "orphan".into(), None);
        assert_eq!(store.messages().len(), 1);
        assert!(store.conversations().is_empty());
    }
}
