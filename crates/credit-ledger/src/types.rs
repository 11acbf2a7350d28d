//! Core ledger types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Unique identifier for a user.
pub type UserId = String;

/// Credit account for a user.
///
/// Balances are held in micro-credits (1 credit unit = 1,000,000 micro).
/// The balance is signed: debits racing each other can drive it negative
/// transiently, never by design.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditAccount {
    /// Owning user.
    pub user_id: UserId,
    /// Current balance in micro-credits.
    pub balance_micro: i64,
    /// When this account was created.
    pub created_at: DateTime<Utc>,
    /// Last balance mutation.
    pub updated_at: DateTime<Utc>,
}

impl CreditAccount {
    /// Create a new account with the given opening balance.
    pub fn new(user_id: UserId, balance_micro: i64) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            balance_micro,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the account holds at least the specified amount.
    pub fn has_balance(&self, required_micro: i64) -> bool {
        self.balance_micro >= required_micro
    }
}

/// Kind of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Credit,
    Debit,
    Bonus,
    Refund,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::Credit => write!(f, "credit"),
            TransactionKind::Debit => write!(f, "debit"),
            TransactionKind::Bonus => write!(f, "bonus"),
            TransactionKind::Refund => write!(f, "refund"),
        }
    }
}

/// Structured metadata attached to a ledger entry.
///
/// The known shapes (chat usage attribution) get typed fields; anything
/// else a caller wants to record lands in the flattened `extra` map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits_used_micro: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TransactionMetadata {
    /// Metadata for a chat usage debit.
    pub fn chat_usage(session_id: impl Into<String>, total_tokens: u32, credits_used_micro: i64) -> Self {
        Self {
            session_id: Some(session_id.into()),
            tokens_used: Some(total_tokens),
            total_tokens: Some(total_tokens),
            credits_used_micro: Some(credits_used_micro),
            extra: Map::new(),
        }
    }
}

/// Immutable ledger entry. Never updated or deleted once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditTransaction {
    /// Unique transaction ID.
    pub id: String,
    /// Owning account's user.
    pub user_id: UserId,
    /// Signed amount in micro-credits: negative for debits, positive for
    /// credits, bonuses and refunds.
    pub amount_micro: i64,
    /// Entry kind.
    pub kind: TransactionKind,
    /// Free-text description.
    pub description: String,
    /// Structured metadata (token counts, session reference).
    #[serde(default)]
    pub metadata: TransactionMetadata,
    /// When this entry was appended.
    pub created_at: DateTime<Utc>,
}

impl CreditTransaction {
    /// Create a new ledger entry.
    pub fn new(
        user_id: UserId,
        amount_micro: i64,
        kind: TransactionKind,
        description: impl Into<String>,
        metadata: TransactionMetadata,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            amount_micro,
            kind,
            description: description.into(),
            metadata,
            created_at: Utc::now(),
        }
    }
}
