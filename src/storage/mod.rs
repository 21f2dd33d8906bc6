//! Persistent state storage for AIBud
//!
//! Application state is stored as a key/value table in SQLite, one row per
//! state key (chat collection, active chat, usage counter, UI and provider
//! settings). Values are JSON-encoded. A schema-version marker guards the
//! table: on mismatch the store is reset to defaults rather than migrated.

use crate::error::{AibudError, Result};
use crate::personas::Persona;
use crate::store::{Chat, ChatUsage};

use anyhow::Context;
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;

/// Current state schema version; bump to force a reset on incompatible change
pub const SCHEMA_VERSION: &str = "1";

/// State keys
pub mod keys {
    pub const SCHEMA_VERSION: &str = "schemaVersion";
    pub const CHATS: &str = "chats";
    pub const ACTIVE_CHAT_ID: &str = "activeChatId";
    pub const OLLAMA_URL: &str = "ollamaUrl";
    pub const SELECTED_MODEL: &str = "selectedModel";
    pub const PERSONALITY: &str = "personality";
    pub const THEME: &str = "theme";
    pub const SIDEBAR_COLLAPSED: &str = "sidebarCollapsed";
    pub const CHAT_USAGE: &str = "chatUsage";
    pub const IS_PRO: &str = "isPro";
    pub const PROVIDER: &str = "provider";
    pub const API_KEY: &str = "apiKey";
    pub const MODEL_NAME: &str = "modelName";
}

/// The full persisted application state
///
/// Every field loads independently: a missing or corrupt value falls back to
/// its default without disturbing the others.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedState {
    pub chats: Vec<Chat>,
    pub active_chat_id: Option<String>,
    pub ollama_url: Option<String>,
    pub selected_model: Option<String>,
    pub persona: Persona,
    pub theme: Option<String>,
    pub sidebar_collapsed: bool,
    pub chat_usage: Option<ChatUsage>,
    pub is_pro: bool,
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub model_name: Option<String>,
}

/// SQLite-backed key/value state store
pub struct KvStorage {
    db_path: PathBuf,
}

impl KvStorage {
    /// Create a new storage instance
    ///
    /// Initializes the database file in the user's data directory.
    pub fn new() -> Result<Self> {
        // Allow override of the state DB path via environment variable, so
        // tests and alternate profiles can avoid the application data dir.
        if let Ok(override_path) = std::env::var("AIBUD_STATE_DB") {
            return Self::new_with_path(override_path);
        }

        let proj_dirs = ProjectDirs::from("com", "aibud", "aibud")
            .ok_or_else(|| AibudError::Storage("Could not determine data directory".into()))?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .context("Failed to create data directory")
            .map_err(|e| AibudError::Storage(e.to_string()))?;

        Self::new_with_path(data_dir.join("state.db"))
    }

    /// Create a new storage instance that uses the specified database path.
    ///
    /// This is primarily useful for tests where the default application data
    /// directory is not desirable (for example, using a temporary directory).
    ///
    /// # Examples
    ///
    /// ```
    /// use aibud::storage::KvStorage;
    ///
    /// let storage = KvStorage::new_with_path("/tmp/test_state.db").unwrap();
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        // Ensure parent directory exists so opening the DB file succeeds.
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for database")
                .map_err(|e| AibudError::Storage(e.to_string()))?;
        }

        let storage = Self { db_path };
        storage.init()?;
        Ok(storage)
    }

    /// Initialize the schema and enforce the version marker
    fn init(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create tables")
        .map_err(|e| AibudError::Storage(e.to_string()))?;

        let stored_version: Option<String> = conn
            .query_row(
                "SELECT value FROM kv WHERE key = ?",
                params![keys::SCHEMA_VERSION],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read schema version")
            .map_err(|e| AibudError::Storage(e.to_string()))?;

        match stored_version.as_deref() {
            Some(v) if v == SCHEMA_VERSION => {}
            Some(v) => {
                tracing::warn!(
                    "State schema version mismatch ({} != {}), resetting state",
                    v,
                    SCHEMA_VERSION
                );
                conn.execute("DELETE FROM kv", [])
                    .context("Failed to reset state")
                    .map_err(|e| AibudError::Storage(e.to_string()))?;
                self.write_version(&conn)?;
            }
            None => self.write_version(&conn)?,
        }

        Ok(())
    }

    fn open(&self) -> Result<Connection> {
        Connection::open(&self.db_path)
            .context("Failed to open database")
            .map_err(|e| AibudError::Storage(e.to_string()).into())
    }

    fn write_version(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?, ?)",
            params![keys::SCHEMA_VERSION, SCHEMA_VERSION],
        )
        .context("Failed to write schema version")
        .map_err(|e| AibudError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Read the raw string value for a key
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.open()?;
        conn.query_row("SELECT value FROM kv WHERE key = ?", params![key], |row| {
            row.get(0)
        })
        .optional()
        .context("Failed to query state key")
        .map_err(|e| AibudError::Storage(e.to_string()).into())
    }

    /// Write the raw string value for a key
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?, ?)",
            params![key, value],
        )
        .context("Failed to write state key")
        .map_err(|e| AibudError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Remove a key
    pub fn remove(&self, key: &str) -> Result<()> {
        let conn = self.open()?;
        conn.execute("DELETE FROM kv WHERE key = ?", params![key])
            .context("Failed to delete state key")
            .map_err(|e| AibudError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Read a JSON-encoded value, falling back to `None` on corruption
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    tracing::warn!("Discarding corrupt state for key '{}': {}", key, e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)
            .context("Failed to serialize state value")
            .map_err(|e| AibudError::Storage(e.to_string()))?;
        self.set(key, &raw)
    }

    /// Load the full persisted state
    ///
    /// Missing or corrupt values fall back to defaults per key; a fresh
    /// database yields `PersistedState::default()`.
    pub fn load_state(&self) -> Result<PersistedState> {
        let persona = match self.get(keys::PERSONALITY)? {
            Some(raw) => Persona::parse_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("Discarding persisted persona: {}", e);
                Persona::default()
            }),
            None => Persona::default(),
        };

        Ok(PersistedState {
            chats: self.get_json(keys::CHATS)?.unwrap_or_default(),
            active_chat_id: self.get(keys::ACTIVE_CHAT_ID)?,
            ollama_url: self.get(keys::OLLAMA_URL)?,
            selected_model: self.get(keys::SELECTED_MODEL)?,
            persona,
            theme: self.get(keys::THEME)?,
            sidebar_collapsed: self
                .get_json(keys::SIDEBAR_COLLAPSED)?
                .unwrap_or_default(),
            chat_usage: self.get_json(keys::CHAT_USAGE)?,
            is_pro: self.get_json(keys::IS_PRO)?.unwrap_or_default(),
            provider: self.get(keys::PROVIDER)?,
            api_key: self.get(keys::API_KEY)?,
            model_name: self.get(keys::MODEL_NAME)?,
        })
    }

    /// Persist the chat collection and active-chat pointer
    pub fn save_chats(&self, chats: &[Chat], active_chat_id: Option<&str>) -> Result<()> {
        self.set_json(keys::CHATS, &chats)?;
        match active_chat_id {
            Some(id) => self.set(keys::ACTIVE_CHAT_ID, id)?,
            None => self.remove(keys::ACTIVE_CHAT_ID)?,
        }
        Ok(())
    }

    /// Persist the usage counter
    pub fn save_usage(&self, usage: &ChatUsage) -> Result<()> {
        self.set_json(keys::CHAT_USAGE, usage)
    }

    /// Persist the active persona
    pub fn save_persona(&self, persona: Persona) -> Result<()> {
        self.set(keys::PERSONALITY, &persona.to_string())
    }

    /// Persist the selected model name
    pub fn save_selected_model(&self, model: &str) -> Result<()> {
        self.set(keys::SELECTED_MODEL, model)
    }

    /// Persist the pro-subscription flag
    pub fn save_is_pro(&self, is_pro: bool) -> Result<()> {
        self.set_json(keys::IS_PRO, &is_pro)
    }
}
