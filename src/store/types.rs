//! Core chat data types
//!
//! These types mirror the persisted JSON shape: chats are ordered lists of
//! messages, and the usage counter tracks a soft monthly message limit.

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default title given to a freshly created chat
pub const NEW_CHAT_TITLE: &str = "New Chat";

/// Number of characters of the first user message used as the chat title
pub const TITLE_PREFIX_LEN: usize = 30;

/// Soft monthly message limit for non-Pro usage
pub const FREE_MONTHLY_MESSAGE_LIMIT: u32 = 100;

/// Role of a chat message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message typed by the user; immutable once created
    User,
    /// Message produced by the model; appended to in place while streaming
    Assistant,
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier for the message
    pub id: String,
    /// Author role
    pub role: Role,
    /// Message text; empty for a freshly created assistant placeholder
    pub content: String,
    /// RFC 3339 creation timestamp
    pub timestamp: String,
    /// Set when the backend request failed and the content was replaced
    /// with the user-visible error string
    #[serde(default, skip_serializing_if = "std::ops::Not::not", rename = "isError")]
    pub is_error: bool,
}

impl Message {
    /// Create a user message with the given text
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now().to_rfc3339(),
            is_error: false,
        }
    }

    /// Create an empty assistant placeholder to be filled by the stream
    pub fn assistant_placeholder() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content: String::new(),
            timestamp: Utc::now().to_rfc3339(),
            is_error: false,
        }
    }
}

/// A conversation: an ordered sequence of messages with a display title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    /// Unique identifier for the chat
    pub id: String,
    /// Display title; defaults to "New Chat" until the first send
    pub title: String,
    /// Messages in insertion order
    pub messages: Vec<Message>,
}

impl Chat {
    /// Create an empty chat with the default title
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: NEW_CHAT_TITLE.to_string(),
            messages: Vec::new(),
        }
    }
}

impl Default for Chat {
    fn default() -> Self {
        Self::new()
    }
}

/// Monthly message counter for the soft client-side limit
///
/// The counter resets whenever the observed calendar month changes. It is a
/// display-only gate, not authoritative enforcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUsage {
    /// Messages sent in the current month
    pub count: u32,
    /// Zero-based calendar month (0-11) the count belongs to
    pub month: u32,
}

impl ChatUsage {
    /// Create a zeroed counter for the current calendar month
    pub fn new() -> Self {
        Self {
            count: 0,
            month: Utc::now().month0(),
        }
    }

    /// Record one sent message, resetting first if the month rolled over
    ///
    /// # Examples
    ///
    /// ```
    /// use aibud::store::ChatUsage;
    ///
    /// let mut usage = ChatUsage::new();
    /// usage.record(usage.month);
    /// assert_eq!(usage.count, 1);
    /// ```
    pub fn record(&mut self, current_month: u32) {
        if self.month != current_month {
            self.count = 0;
            self.month = current_month;
        }
        self.count += 1;
    }

    /// Whether the soft limit blocks another send in the given month
    pub fn limit_reached(&self, current_month: u32, limit: u32) -> bool {
        self.month == current_month && self.count >= limit
    }
}

impl Default for ChatUsage {
    fn default() -> Self {
        Self::new()
    }
}
