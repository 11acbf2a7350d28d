//! In-memory session store.

use crate::error::SessionError;
use crate::types::*;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

/// A session together with its ordered messages and sequence counter.
struct SessionEntry {
    session: ChatSession,
    messages: Vec<ChatMessage>,
    next_seq: u64,
}

impl SessionEntry {
    fn new(session: ChatSession) -> Self {
        Self {
            session,
            messages: Vec::new(),
            next_seq: 0,
        }
    }

    fn push(&mut self, mut message: ChatMessage) -> ChatMessage {
        message.seq = self.next_seq;
        self.next_seq += 1;
        self.messages.push(message.clone());
        self.session.updated_at = Utc::now();
        message
    }
}

/// Session store keyed by session id.
///
/// All mutations for one call happen under a single write lock, so an
/// exchange pair is appended atomically and a delete removes the
/// session and every message in one operation.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Resolve an existing session or create a new one.
    ///
    /// When `session_id` is given the session must exist, belong to the
    /// caller and be active; anything else reads as not found, without
    /// leaking whether the id exists. When omitted, a fresh active
    /// session is created and titled from the first message.
    #[instrument(skip(self, first_message))]
    pub async fn get_or_create_session(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        first_message: Option<&str>,
    ) -> Result<ChatSession, SessionError> {
        match session_id {
            Some(id) => {
                let sessions = self.sessions.read().await;
                sessions
                    .get(id)
                    .filter(|e| e.session.user_id == user_id)
                    .filter(|e| e.session.status == SessionStatus::Active)
                    .map(|e| e.session.clone())
                    .ok_or_else(|| SessionError::SessionNotFound(id.to_string()))
            }
            None => {
                let session = ChatSession::new(user_id, first_message);
                let mut sessions = self.sessions.write().await;
                sessions.insert(session.id.clone(), SessionEntry::new(session.clone()));
                info!("Created session {} for {}", session.id, user_id);
                Ok(session)
            }
        }
    }

    /// Look up a session of any status, ownership-checked.
    pub async fn get_owned(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<ChatSession, SessionError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .filter(|e| e.session.user_id == user_id)
            .map(|e| e.session.clone())
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))
    }

    /// Append one exchange: the user message, then the assistant reply,
    /// each carrying its own token and cost attribution.
    ///
    /// Both appends happen under one write lock; a reader never sees a
    /// half-written pair.
    #[instrument(skip_all, fields(session_id = %session_id))]
    pub async fn append_exchange(
        &self,
        session_id: &str,
        user_text: &str,
        user_tokens: Option<u32>,
        user_cost_micro: Option<i64>,
        assistant_text: &str,
        assistant_tokens: Option<u32>,
        assistant_cost_micro: Option<i64>,
    ) -> Result<(ChatMessage, ChatMessage), SessionError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;

        let user_message = entry.push(ChatMessage::new(
            session_id,
            MessageRole::User,
            user_text,
            user_tokens,
            user_cost_micro,
            0,
        ));
        let assistant_message = entry.push(ChatMessage::new(
            session_id,
            MessageRole::Assistant,
            assistant_text,
            assistant_tokens,
            assistant_cost_micro,
            0,
        ));

        debug!(
            "Appended exchange to {} (total: {})",
            session_id,
            entry.messages.len()
        );

        Ok((user_message, assistant_message))
    }

    /// Messages of a session in insertion order. This sequence is the
    /// prompt context for the next model call.
    pub async fn list_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>, SessionError> {
        let sessions = self.sessions.read().await;
        let entry = sessions
            .get(session_id)
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;

        let mut messages = entry.messages.clone();
        messages.sort_by_key(|m| m.seq);
        Ok(messages)
    }

    /// A user's sessions, most recently updated first.
    pub async fn list_sessions(&self, user_id: &str) -> Vec<ChatSession> {
        let sessions = self.sessions.read().await;
        let mut result: Vec<ChatSession> = sessions
            .values()
            .filter(|e| e.session.user_id == user_id)
            .map(|e| e.session.clone())
            .collect();
        result.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        result
    }

    /// Move a session to a new status. No transition guard: any status
    /// is reachable from any status.
    #[instrument(skip(self))]
    pub async fn set_status(
        &self,
        user_id: &str,
        session_id: &str,
        status: SessionStatus,
    ) -> Result<ChatSession, SessionError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(session_id)
            .filter(|e| e.session.user_id == user_id)
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;

        entry.session.status = status;
        entry.session.updated_at = Utc::now();
        Ok(entry.session.clone())
    }

    /// Retitle a session.
    pub async fn set_title(
        &self,
        session_id: &str,
        title: impl Into<String>,
    ) -> Result<ChatSession, SessionError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;

        entry.session.title = title.into();
        entry.session.updated_at = Utc::now();
        Ok(entry.session.clone())
    }

    /// Delete a session and all of its messages in one operation.
    #[instrument(skip(self))]
    pub async fn delete_session(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;

        let owned = sessions
            .get(session_id)
            .map(|e| e.session.user_id == user_id)
            .unwrap_or(false);
        if !owned {
            return Err(SessionError::SessionNotFound(session_id.to_string()));
        }

        sessions.remove(session_id);
        info!("Deleted session {} for {}", session_id, user_id);
        Ok(())
    }

    /// Move every session of a user from one status to another.
    ///
    /// Same-status moves are rejected at this boundary as invalid input.
    /// Returns the count and ids of the moved sessions.
    #[instrument(skip(self))]
    pub async fn bulk_transition(
        &self,
        user_id: &str,
        from: SessionStatus,
        to: SessionStatus,
    ) -> Result<(usize, Vec<String>), SessionError> {
        if from == to {
            return Err(SessionError::InvalidTransition(format!(
                "sessions are already {}",
                from
            )));
        }

        let mut sessions = self.sessions.write().await;
        let now = Utc::now();
        let mut moved = Vec::new();

        for entry in sessions
            .values_mut()
            .filter(|e| e.session.user_id == user_id && e.session.status == from)
        {
            entry.session.status = to;
            entry.session.updated_at = now;
            moved.push(entry.session.id.clone());
        }

        info!(
            "Moved {} sessions for {} from {} to {}",
            moved.len(),
            user_id,
            from,
            to
        );

        Ok((moved.len(), moved))
    }

    /// Total number of sessions across all users.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
