//! Chat state store for AIBud
//!
//! The store owns the chat collection and the active-chat selection, and
//! applies every state transition as an atomic replacement of the collection:
//! an operation either fully applies or leaves the previous snapshot intact,
//! so readers always observe a consistent state.
//!
//! Persistence is deliberately not wired in here; the session layer commits
//! each transition to the storage adapter after it succeeds.

use crate::error::{AibudError, Result};

pub mod types;
pub use types::{
    Chat, ChatUsage, Message, Role, FREE_MONTHLY_MESSAGE_LIMIT, NEW_CHAT_TITLE, TITLE_PREFIX_LEN,
};

/// Persona-template marker that must never reach rendered content
pub const COMPANY_PLACEHOLDER: &str = "<company_name>";

/// Product name substituted for the placeholder marker
pub const PRODUCT_NAME: &str = "AIBud";

/// User-visible text substituted into a failed assistant message
pub const ERROR_MESSAGE: &str = "Sorry, I encountered an error.";

/// In-memory chat collection with an active-chat cursor
///
/// # Examples
///
/// ```
/// use aibud::store::ChatStore;
///
/// let mut store = ChatStore::new();
/// let chat_id = store.new_chat();
/// let (user_id, assistant_id) = store.append(&chat_id, "Hello there").unwrap();
/// store.apply_token(&chat_id, &assistant_id, "Hi!").unwrap();
/// assert_eq!(store.chat(&chat_id).unwrap().messages.len(), 2);
/// # let _ = user_id;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ChatStore {
    chats: Vec<Chat>,
    active_chat_id: Option<String>,
}

impl ChatStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from persisted chats and active-chat selection
    ///
    /// An active id that does not match any chat falls back to the first
    /// chat in the list, matching load-time behavior of the persisted state.
    pub fn from_parts(chats: Vec<Chat>, active_chat_id: Option<String>) -> Self {
        let active_chat_id = active_chat_id
            .filter(|id| chats.iter().any(|c| &c.id == id))
            .or_else(|| chats.first().map(|c| c.id.clone()));
        Self {
            chats,
            active_chat_id,
        }
    }

    /// All chats, most recent first
    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    /// Currently selected chat id, if any
    pub fn active_chat_id(&self) -> Option<&str> {
        self.active_chat_id.as_deref()
    }

    /// Currently selected chat, if any
    pub fn active_chat(&self) -> Option<&Chat> {
        let id = self.active_chat_id.as_deref()?;
        self.chats.iter().find(|c| c.id == id)
    }

    /// Look up a chat by id
    pub fn chat(&self, chat_id: &str) -> Result<&Chat> {
        self.chats
            .iter()
            .find(|c| c.id == chat_id)
            .ok_or_else(|| AibudError::ChatNotFound(chat_id.to_string()).into())
    }

    /// Create a new empty chat, prepend it to the list, and make it active
    ///
    /// Returns the new chat's id.
    pub fn new_chat(&mut self) -> String {
        let chat = Chat::new();
        let id = chat.id.clone();
        let mut next = Vec::with_capacity(self.chats.len() + 1);
        next.push(chat);
        next.extend(self.chats.drain(..));
        self.chats = next;
        self.active_chat_id = Some(id.clone());
        id
    }

    /// Append a user message and an empty assistant placeholder to a chat
    ///
    /// If this is the chat's first message pair, the chat title becomes the
    /// first [`TITLE_PREFIX_LEN`] characters of the user text.
    ///
    /// Returns the ids of the user message and the assistant placeholder.
    pub fn append(&mut self, chat_id: &str, user_text: &str) -> Result<(String, String)> {
        let idx = self.index_of(chat_id)?;

        let user = Message::user(user_text);
        let assistant = Message::assistant_placeholder();
        let ids = (user.id.clone(), assistant.id.clone());

        let mut next = self.chats.clone();
        let chat = &mut next[idx];
        if chat.messages.is_empty() {
            chat.title = user_text.chars().take(TITLE_PREFIX_LEN).collect();
        }
        chat.messages.push(user);
        chat.messages.push(assistant);
        self.chats = next;

        Ok(ids)
    }

    /// Append a decoded token to an in-flight assistant message
    ///
    /// The persona-template placeholder is replaced with the product name
    /// across the accumulated content after every append, so the marker never
    /// survives even when it arrives split over several tokens.
    pub fn apply_token(&mut self, chat_id: &str, assistant_id: &str, token: &str) -> Result<()> {
        let idx = self.index_of(chat_id)?;

        let mut next = self.chats.clone();
        let msg = next[idx]
            .messages
            .iter_mut()
            .find(|m| m.id == assistant_id)
            .ok_or_else(|| AibudError::MessageNotFound(assistant_id.to_string()))?;
        msg.content.push_str(token);
        if msg.content.contains(COMPANY_PLACEHOLDER) {
            msg.content = msg.content.replace(COMPANY_PLACEHOLDER, PRODUCT_NAME);
        }
        self.chats = next;

        Ok(())
    }

    /// Replace a failed assistant message with the error text
    ///
    /// Used when the backend request fails for a reason other than
    /// user-initiated cancellation.
    pub fn mark_error(&mut self, chat_id: &str, assistant_id: &str) -> Result<()> {
        let idx = self.index_of(chat_id)?;

        let mut next = self.chats.clone();
        let msg = next[idx]
            .messages
            .iter_mut()
            .find(|m| m.id == assistant_id)
            .ok_or_else(|| AibudError::MessageNotFound(assistant_id.to_string()))?;
        msg.content = ERROR_MESSAGE.to_string();
        msg.is_error = true;
        self.chats = next;

        Ok(())
    }

    /// Rename a chat
    pub fn rename(&mut self, chat_id: &str, new_title: &str) -> Result<()> {
        let idx = self.index_of(chat_id)?;

        let mut next = self.chats.clone();
        next[idx].title = new_title.to_string();
        self.chats = next;

        Ok(())
    }

    /// Delete a chat
    ///
    /// Deleting the active chat selects the immediately preceding chat in the
    /// list; deleting the last remaining chat creates a fresh chat and makes
    /// it active. Returns the id of the chat that is active afterwards.
    pub fn delete(&mut self, chat_id: &str) -> Result<String> {
        let idx = self.index_of(chat_id)?;

        let mut next = self.chats.clone();
        next.remove(idx);

        if self.active_chat_id.as_deref() == Some(chat_id) {
            if next.is_empty() {
                let chat = Chat::new();
                self.active_chat_id = Some(chat.id.clone());
                next.push(chat);
            } else {
                let new_active = idx.saturating_sub(1).min(next.len() - 1);
                self.active_chat_id = Some(next[new_active].id.clone());
            }
        }
        self.chats = next;

        Ok(self
            .active_chat_id
            .clone()
            .unwrap_or_else(|| chat_id.to_string()))
    }

    /// Make a chat the active one
    pub fn switch_active(&mut self, chat_id: &str) -> Result<()> {
        self.index_of(chat_id)?;
        self.active_chat_id = Some(chat_id.to_string());
        Ok(())
    }

    fn index_of(&self, chat_id: &str) -> Result<usize> {
        self.chats
            .iter()
            .position(|c| c.id == chat_id)
            .ok_or_else(|| AibudError::ChatNotFound(chat_id.to_string()).into())
    }
}
