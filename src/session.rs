//! Chat session orchestration for AIBud
//!
//! The session owns the chat store, persistence, the active provider, and the
//! search client, and drives a full send: usage gate, optional search
//! augmentation, message append, token streaming, and error handling. Each
//! committed state transition is persisted before the next one begins.
//!
//! Streaming is tracked per chat: at most one response may be in flight for a
//! given chat, and `stop` cancels that chat's stream without touching others.

use crate::config::SearchConfig;
use crate::error::{AibudError, Result};
use crate::personas::Persona;
use crate::providers::{GenerateRequest, Provider};
use crate::search::SearchClient;
use crate::storage::KvStorage;
use crate::store::{ChatStore, ChatUsage, FREE_MONTHLY_MESSAGE_LIMIT};
use crate::stream::StreamOutcome;

use chrono::{Datelike, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// How a send finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The stream ran to natural completion
    Completed,
    /// The stream was cancelled; partial content is kept as-is
    Cancelled,
    /// The backend failed; the assistant message was replaced with the
    /// user-visible error text
    Failed,
}

/// A live chat session bound to one provider and one state database
pub struct ChatSession {
    store: ChatStore,
    storage: KvStorage,
    provider: Arc<dyn Provider>,
    search: SearchClient,
    persona: Persona,
    usage: ChatUsage,
    is_pro: bool,
    inflight: HashMap<String, CancellationToken>,
}

impl ChatSession {
    /// Create a session, restoring persisted state
    ///
    /// The chat collection, active chat, persona, usage counter, and pro flag
    /// are loaded from storage; an empty state starts with one fresh chat.
    ///
    /// # Errors
    ///
    /// Returns error if the persisted state cannot be read
    pub fn new(
        provider: Arc<dyn Provider>,
        storage: KvStorage,
        search_config: SearchConfig,
    ) -> Result<Self> {
        let state = storage.load_state()?;
        let search = SearchClient::new(search_config)?;

        let mut store = ChatStore::from_parts(state.chats, state.active_chat_id);
        if store.chats().is_empty() {
            store.new_chat();
        }

        tracing::info!(
            "Session restored: {} chats, persona={}, pro={}",
            store.chats().len(),
            state.persona,
            state.is_pro
        );

        Ok(Self {
            store,
            storage,
            provider,
            search,
            persona: state.persona,
            usage: state.chat_usage.unwrap_or_default(),
            is_pro: state.is_pro,
            inflight: HashMap::new(),
        })
    }

    /// Send a user message on a chat and stream the response
    ///
    /// `on_token` is invoked for every decoded token after it has been applied
    /// to the assistant message. The returned outcome distinguishes natural
    /// completion, cancellation (partial content kept), and backend failure
    /// (content replaced with the error text).
    ///
    /// # Errors
    ///
    /// Returns [`AibudError::InFlight`] when the chat already has a response
    /// streaming, [`AibudError::UsageLimitReached`] when the monthly soft
    /// limit blocks a non-Pro send, and [`AibudError::ChatNotFound`] for an
    /// unknown chat id. Backend failures are not errors; they surface as
    /// [`SendOutcome::Failed`].
    pub async fn send(
        &mut self,
        chat_id: &str,
        text: &str,
        on_token: impl FnMut(&str),
    ) -> Result<SendOutcome> {
        self.send_with_cancel(chat_id, text, CancellationToken::new(), on_token)
            .await
    }

    /// Send with an externally supplied cancellation token
    ///
    /// The caller keeps a clone of `cancel` and may trigger it from another
    /// task (for example a Ctrl-C handler) while the send is streaming.
    pub async fn send_with_cancel(
        &mut self,
        chat_id: &str,
        text: &str,
        cancel: CancellationToken,
        mut on_token: impl FnMut(&str),
    ) -> Result<SendOutcome> {
        if self.inflight.contains_key(chat_id) {
            return Err(AibudError::InFlight(chat_id.to_string()).into());
        }
        self.store.chat(chat_id)?;

        let current_month = Utc::now().month0();
        if !self.is_pro && self.usage.limit_reached(current_month, FREE_MONTHLY_MESSAGE_LIMIT) {
            return Err(AibudError::UsageLimitReached {
                limit: FREE_MONTHLY_MESSAGE_LIMIT,
                message: "upgrade to Pro for unlimited messages".to_string(),
            }
            .into());
        }

        // Search failures never abort the turn; the send proceeds without
        // augmentation.
        let search_context = match self.search.search(text).await {
            Ok(context) => context,
            Err(e) => {
                tracing::warn!("Web search failed, continuing without context: {}", e);
                None
            }
        };

        let (_user_id, assistant_id) = self.store.append(chat_id, text)?;
        self.usage.record(current_month);
        self.persist_chats()?;
        self.storage.save_usage(&self.usage)?;

        let request = GenerateRequest {
            persona: self.persona,
            search_context,
            history: self.store.chat(chat_id)?.messages.clone(),
        };

        self.inflight.insert(chat_id.to_string(), cancel.clone());

        let (token_tx, mut token_rx) = mpsc::unbounded_channel();
        let provider = Arc::clone(&self.provider);
        let generate = tokio::spawn(async move {
            provider.generate(&request, token_tx, cancel).await
        });

        // The inflight entry must be cleared on every exit path, so the loop
        // collects a store error instead of propagating past the removal.
        let mut apply_error = None;
        while let Some(token) = token_rx.recv().await {
            if let Err(e) = self.store.apply_token(chat_id, &assistant_id, &token) {
                apply_error = Some(e);
                break;
            }
            on_token(&token);
        }

        self.inflight.remove(chat_id);
        if let Some(e) = apply_error {
            return Err(e);
        }

        let result = match generate.await {
            Ok(result) => result,
            Err(e) => Err(AibudError::Provider(format!("Stream task failed: {}", e)).into()),
        };

        let outcome = match result {
            Ok(StreamOutcome::Completed) => SendOutcome::Completed,
            Ok(StreamOutcome::Cancelled) => {
                tracing::debug!("Generation cancelled for chat {}", chat_id);
                SendOutcome::Cancelled
            }
            Err(e) => {
                tracing::warn!("Generation failed for chat {}: {}", chat_id, e);
                self.store.mark_error(chat_id, &assistant_id)?;
                SendOutcome::Failed
            }
        };

        self.persist_chats()?;
        Ok(outcome)
    }

    /// Cancel the in-flight response for a chat, if any
    ///
    /// Returns true when a stream was actually cancelled.
    pub fn stop(&mut self, chat_id: &str) -> bool {
        match self.inflight.get(chat_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Create a new chat and make it active
    pub fn new_chat(&mut self) -> Result<String> {
        let id = self.store.new_chat();
        self.persist_chats()?;
        Ok(id)
    }

    /// Switch the active chat
    pub fn switch_chat(&mut self, chat_id: &str) -> Result<()> {
        self.store.switch_active(chat_id)?;
        self.persist_chats()
    }

    /// Rename a chat
    pub fn rename_chat(&mut self, chat_id: &str, title: &str) -> Result<()> {
        self.store.rename(chat_id, title)?;
        self.persist_chats()
    }

    /// Delete a chat; returns the id of the chat active afterwards
    ///
    /// An in-flight stream on the deleted chat is cancelled first.
    pub fn delete_chat(&mut self, chat_id: &str) -> Result<String> {
        self.stop(chat_id);
        self.inflight.remove(chat_id);
        let active = self.store.delete(chat_id)?;
        self.persist_chats()?;
        Ok(active)
    }

    /// Change the active persona
    pub fn set_persona(&mut self, persona: Persona) -> Result<()> {
        self.persona = persona;
        self.storage.save_persona(persona)
    }

    /// Mark the session as Pro (removes the monthly soft limit)
    pub fn set_pro(&mut self, is_pro: bool) -> Result<()> {
        self.is_pro = is_pro;
        self.storage.save_is_pro(is_pro)
    }

    /// Re-read the persisted Pro flag
    ///
    /// The billing server enables Pro out-of-process when checkout
    /// completes; this picks the change up without restarting the session.
    pub fn refresh_pro(&mut self) -> Result<bool> {
        let state = self.storage.load_state()?;
        self.is_pro = state.is_pro;
        Ok(self.is_pro)
    }

    /// Toggle search augmentation for subsequent sends
    pub fn set_search_enabled(&mut self, enabled: bool) {
        self.search.set_enabled(enabled);
    }

    /// Whether search augmentation is currently active
    pub fn search_enabled(&self) -> bool {
        self.search.is_enabled()
    }

    /// The chat store snapshot
    pub fn store(&self) -> &ChatStore {
        &self.store
    }

    /// The active persona
    pub fn persona(&self) -> Persona {
        self.persona
    }

    /// The current usage counter
    pub fn usage(&self) -> ChatUsage {
        self.usage
    }

    /// Whether the session is Pro
    pub fn is_pro(&self) -> bool {
        self.is_pro
    }

    /// Messages remaining this month, or None for Pro (unlimited)
    pub fn remaining_messages(&self) -> Option<u32> {
        if self.is_pro {
            return None;
        }
        let current_month = Utc::now().month0();
        if self.usage.month != current_month {
            return Some(FREE_MONTHLY_MESSAGE_LIMIT);
        }
        Some(FREE_MONTHLY_MESSAGE_LIMIT.saturating_sub(self.usage.count))
    }

    /// The provider backing this session
    pub fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    /// Replace the provider, persisting its model as the selected model
    ///
    /// Used by the `/model` command; in-flight streams keep the provider
    /// they started with.
    pub fn replace_provider(&mut self, provider: Arc<dyn Provider>) -> Result<()> {
        self.storage.save_selected_model(&provider.model())?;
        tracing::info!("Switched model to {}", provider.model());
        self.provider = provider;
        Ok(())
    }

    fn persist_chats(&self) -> Result<()> {
        self.storage
            .save_chats(self.store.chats(), self.store.active_chat_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ModelInfo;
    use crate::store::ERROR_MESSAGE;
    use async_trait::async_trait;
    use tempfile::tempdir;

    /// Provider that replays a fixed token script, fails, or blocks until
    /// cancelled, depending on construction.
    struct ScriptedProvider {
        tokens: Vec<String>,
        fail: bool,
        block_until_cancel: bool,
    }

    impl ScriptedProvider {
        fn completing(tokens: &[&str]) -> Self {
            Self {
                tokens: tokens.iter().map(|t| t.to_string()).collect(),
                fail: false,
                block_until_cancel: false,
            }
        }

        fn failing() -> Self {
            Self {
                tokens: Vec::new(),
                fail: true,
                block_until_cancel: false,
            }
        }

        fn blocking(tokens: &[&str]) -> Self {
            Self {
                tokens: tokens.iter().map(|t| t.to_string()).collect(),
                fail: false,
                block_until_cancel: true,
            }
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        async fn generate(
            &self,
            _request: &GenerateRequest,
            token_tx: mpsc::UnboundedSender<String>,
            cancel: CancellationToken,
        ) -> Result<StreamOutcome> {
            if self.fail {
                return Err(AibudError::Provider("scripted failure".to_string()).into());
            }
            for token in &self.tokens {
                let _ = token_tx.send(token.clone());
            }
            if self.block_until_cancel {
                cancel.cancelled().await;
                return Ok(StreamOutcome::Cancelled);
            }
            Ok(StreamOutcome::Completed)
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>> {
            Ok(vec![ModelInfo::new("scripted")])
        }

        fn name(&self) -> &'static str {
            "scripted"
        }

        fn model(&self) -> String {
            "scripted".to_string()
        }
    }

    fn test_session(provider: ScriptedProvider) -> (ChatSession, tempfile::TempDir) {
        let dir = tempdir().expect("failed to create tempdir");
        let storage = KvStorage::new_with_path(dir.path().join("state.db")).unwrap();
        let session =
            ChatSession::new(Arc::new(provider), storage, SearchConfig::default()).unwrap();
        (session, dir)
    }

    #[tokio::test]
    async fn test_send_streams_tokens_into_assistant_message() {
        let (mut session, _dir) = test_session(ScriptedProvider::completing(&["Hel", "lo"]));
        let chat_id = session.store().active_chat_id().unwrap().to_string();

        let mut seen = String::new();
        let outcome = session
            .send(&chat_id, "hi", |t| seen.push_str(t))
            .await
            .unwrap();

        assert_eq!(outcome, SendOutcome::Completed);
        assert_eq!(seen, "Hello");
        let chat = session.store().chat(&chat_id).unwrap();
        assert_eq!(chat.messages.len(), 2);
        assert_eq!(chat.messages[1].content, "Hello");
        assert_eq!(chat.title, "hi");
    }

    #[tokio::test]
    async fn test_send_records_usage() {
        let (mut session, _dir) = test_session(ScriptedProvider::completing(&["ok"]));
        let chat_id = session.store().active_chat_id().unwrap().to_string();

        assert_eq!(session.usage().count, 0);
        session.send(&chat_id, "one", |_| {}).await.unwrap();
        session.send(&chat_id, "two", |_| {}).await.unwrap();
        assert_eq!(session.usage().count, 2);
        assert_eq!(
            session.remaining_messages(),
            Some(FREE_MONTHLY_MESSAGE_LIMIT - 2)
        );
    }

    #[tokio::test]
    async fn test_send_blocked_at_usage_limit() {
        let (mut session, _dir) = test_session(ScriptedProvider::completing(&["ok"]));
        let chat_id = session.store().active_chat_id().unwrap().to_string();

        session.usage = ChatUsage {
            count: FREE_MONTHLY_MESSAGE_LIMIT,
            month: Utc::now().month0(),
        };

        let result = session.send(&chat_id, "hi", |_| {}).await;
        assert!(result.is_err());
        // The blocked send must not have appended anything.
        assert!(session.store().chat(&chat_id).unwrap().messages.is_empty());
    }

    #[tokio::test]
    async fn test_pro_session_bypasses_usage_limit() {
        let (mut session, _dir) = test_session(ScriptedProvider::completing(&["ok"]));
        let chat_id = session.store().active_chat_id().unwrap().to_string();

        session.set_pro(true).unwrap();
        session.usage = ChatUsage {
            count: FREE_MONTHLY_MESSAGE_LIMIT + 50,
            month: Utc::now().month0(),
        };

        let outcome = session.send(&chat_id, "hi", |_| {}).await.unwrap();
        assert_eq!(outcome, SendOutcome::Completed);
        assert_eq!(session.remaining_messages(), None);
    }

    #[tokio::test]
    async fn test_send_failure_marks_error_message() {
        let (mut session, _dir) = test_session(ScriptedProvider::failing());
        let chat_id = session.store().active_chat_id().unwrap().to_string();

        let outcome = session.send(&chat_id, "hi", |_| {}).await.unwrap();
        assert_eq!(outcome, SendOutcome::Failed);

        let chat = session.store().chat(&chat_id).unwrap();
        assert_eq!(chat.messages[1].content, ERROR_MESSAGE);
        assert!(chat.messages[1].is_error);
    }

    #[tokio::test]
    async fn test_cancelled_send_keeps_partial_content() {
        let (mut session, _dir) = test_session(ScriptedProvider::blocking(&["par", "tial"]));
        let chat_id = session.store().active_chat_id().unwrap().to_string();

        let cancel = CancellationToken::new();
        let handle = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            handle.cancel();
        });

        let outcome = session
            .send_with_cancel(&chat_id, "hi", cancel, |_| {})
            .await
            .unwrap();
        assert_eq!(outcome, SendOutcome::Cancelled);

        let chat = session.store().chat(&chat_id).unwrap();
        assert_eq!(chat.messages[1].content, "partial");
        assert!(!chat.messages[1].is_error);
    }

    #[tokio::test]
    async fn test_send_unknown_chat_fails() {
        let (mut session, _dir) = test_session(ScriptedProvider::completing(&["x"]));
        assert!(session.send("missing", "hi", |_| {}).await.is_err());
    }

    #[tokio::test]
    async fn test_state_persists_across_sessions() {
        let dir = tempdir().expect("failed to create tempdir");
        let db_path = dir.path().join("state.db");

        let chat_id = {
            let storage = KvStorage::new_with_path(&db_path).unwrap();
            let mut session = ChatSession::new(
                Arc::new(ScriptedProvider::completing(&["Hello"])),
                storage,
                SearchConfig::default(),
            )
            .unwrap();
            let chat_id = session.store().active_chat_id().unwrap().to_string();
            session.send(&chat_id, "remember me", |_| {}).await.unwrap();
            session.set_persona(Persona::Friendly).unwrap();
            chat_id
        };

        let storage = KvStorage::new_with_path(&db_path).unwrap();
        let session = ChatSession::new(
            Arc::new(ScriptedProvider::completing(&[])),
            storage,
            SearchConfig::default(),
        )
        .unwrap();

        assert_eq!(session.persona(), Persona::Friendly);
        assert_eq!(session.usage().count, 1);
        let chat = session.store().chat(&chat_id).unwrap();
        assert_eq!(chat.messages[1].content, "Hello");
        assert_eq!(session.store().active_chat_id(), Some(chat_id.as_str()));
    }

    #[tokio::test]
    async fn test_delete_active_chat_moves_selection() {
        let (mut session, _dir) = test_session(ScriptedProvider::completing(&["x"]));
        let first = session.store().active_chat_id().unwrap().to_string();
        let second = session.new_chat().unwrap();

        let active = session.delete_chat(&second).unwrap();
        assert_eq!(active, first);
        assert_eq!(session.store().active_chat_id(), Some(first.as_str()));
    }

    #[tokio::test]
    async fn test_stop_without_inflight_returns_false() {
        let (mut session, _dir) = test_session(ScriptedProvider::completing(&["x"]));
        let chat_id = session.store().active_chat_id().unwrap().to_string();
        assert!(!session.stop(&chat_id));
    }

    #[tokio::test]
    async fn test_refresh_pro_picks_up_billing_upgrade() {
        let dir = tempdir().expect("failed to create tempdir");
        let db_path = dir.path().join("state.db");

        let storage = KvStorage::new_with_path(&db_path).unwrap();
        let mut session = ChatSession::new(
            Arc::new(ScriptedProvider::completing(&["ok"])),
            storage,
            SearchConfig::default(),
        )
        .unwrap();
        assert!(!session.is_pro());

        // The billing server flips the flag through its own storage handle.
        let billing_storage = KvStorage::new_with_path(&db_path).unwrap();
        billing_storage.save_is_pro(true).unwrap();

        assert!(session.refresh_pro().unwrap());
        assert!(session.is_pro());
        assert_eq!(session.remaining_messages(), None);
    }

    #[tokio::test]
    async fn test_inflight_cleared_after_failed_send() {
        let (mut session, _dir) = test_session(ScriptedProvider::failing());
        let chat_id = session.store().active_chat_id().unwrap().to_string();

        let outcome = session.send(&chat_id, "hi", |_| {}).await.unwrap();
        assert_eq!(outcome, SendOutcome::Failed);
        assert!(session.inflight.is_empty());

        // A follow-up send on the same chat must not be rejected as in-flight.
        let result = session.send(&chat_id, "again", |_| {}).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_stop_cancels_only_the_named_chat() {
        let (mut session, _dir) = test_session(ScriptedProvider::completing(&[]));

        let token_a = CancellationToken::new();
        let token_b = CancellationToken::new();
        session.inflight.insert("a".to_string(), token_a.clone());
        session.inflight.insert("b".to_string(), token_b.clone());

        assert!(session.stop("a"));
        assert!(token_a.is_cancelled());
        assert!(!token_b.is_cancelled());
    }

    #[tokio::test]
    async fn test_fresh_session_starts_with_one_chat() {
        let (session, _dir) = test_session(ScriptedProvider::completing(&[]));
        assert_eq!(session.store().chats().len(), 1);
        assert!(session.store().active_chat_id().is_some());
    }
}
