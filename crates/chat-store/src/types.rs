//! Session and message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Maximum title length before truncation kicks in.
const TITLE_MAX_CHARS: usize = 50;

/// Characters kept from the first message when truncating.
const TITLE_TRUNCATE_CHARS: usize = 47;

/// Session lifecycle status.
///
/// Any status is reachable from any status; there is no transition
/// guard on single-session moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Archived,
    Completed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::Archived => write!(f, "archived"),
            SessionStatus::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "archived" => Ok(SessionStatus::Archived),
            "completed" => Ok(SessionStatus::Completed),
            other => Err(format!("unknown session status: {}", other)),
        }
    }
}

/// Message role within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    /// Create a new active session, titling it from the first message.
    pub fn new(user_id: impl Into<String>, first_message: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            title: derive_title(first_message.unwrap_or("New chat")),
            status: SessionStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One turn in a session. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    /// Tokens attributed to this message, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,
    /// Cost attributed to this message in micro-credits, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_micro: Option<i64>,
    /// Monotonic per-session ordering key. Readback order follows this,
    /// not the wall clock.
    pub seq: u64,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(
        session_id: impl Into<String>,
        role: MessageRole,
        content: impl Into<String>,
        tokens_used: Option<u32>,
        cost_micro: Option<i64>,
        seq: u64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            role,
            content: content.into(),
            tokens_used,
            cost_micro,
            seq,
            created_at: Utc::now(),
        }
    }
}

/// Derive a session title from its first message.
///
/// Messages longer than 50 characters are cut to the first 47 plus an
/// ellipsis; shorter ones are used verbatim. Counts characters, not
/// bytes, so multibyte text never splits mid-codepoint.
pub fn derive_title(text: &str) -> String {
    if text.chars().count() > TITLE_MAX_CHARS {
        let truncated: String = text.chars().take(TITLE_TRUNCATE_CHARS).collect();
        format!("{}…", truncated)
    } else {
        text.to_string()
    }
}
