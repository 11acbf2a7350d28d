//! The chat service: one business transaction per turn.

use crate::config::Config;
use crate::error::{ServiceError, ServiceResult};
use crate::events::EventPublisher;
use anyhow::Context;
use chat_store::{derive_title, ChatMessage, ChatSession, MessageRole, SessionStatus, SessionStore};
use chrono::{DateTime, Utc};
use credit_ledger::{
    cost_from_tokens, split_cost, CreditLedger, CreditTransaction, TokenUsage,
    TransactionKind, TransactionMetadata,
};
use llm_client::{ChatProvider, LlmClient, Message};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// How many ledger entries a balance view carries.
const RECENT_TRANSACTIONS_LIMIT: usize = 20;

/// Usage summaries cover the last 30 days.
const USAGE_WINDOW_DAYS: i64 = 30;

/// Result of one chat turn.
#[derive(Debug, Clone)]
pub struct ChatTurnResult {
    pub session_id: String,
    pub response: String,
    /// Credits charged for this turn, in micro-credits.
    pub cost_micro: i64,
    /// Balance after the debit, in micro-credits.
    pub remaining_micro: i64,
    pub usage: TokenUsage,
}

/// A session together with its ordered messages.
#[derive(Debug, Clone)]
pub struct SessionDetail {
    pub session: ChatSession,
    pub messages: Vec<ChatMessage>,
}

/// Balance, recent history and a usage summary for one user.
#[derive(Debug, Clone)]
pub struct CreditBalanceView {
    pub balance_micro: i64,
    pub recent_transactions: Vec<CreditTransaction>,
    pub usage_by_kind: HashMap<TransactionKind, i64>,
}

/// Credit-metered chat service.
///
/// Composes the credit ledger and the session store around the
/// completion provider. The ledger is a mechanical accumulator; the
/// "can this user spend?" rule lives here.
pub struct ChatService {
    ledger: Arc<CreditLedger>,
    sessions: SessionStore,
    provider: Arc<dyn ChatProvider>,
    publisher: Option<Arc<dyn EventPublisher>>,
    system_prompt: String,
}

impl ChatService {
    pub fn new(
        ledger: Arc<CreditLedger>,
        sessions: SessionStore,
        provider: Arc<dyn ChatProvider>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            ledger,
            sessions,
            provider,
            publisher: None,
            system_prompt: system_prompt.into(),
        }
    }

    /// Attach a side-channel event publisher.
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Wire a service from configuration: ledger snapshot, session
    /// store and the HTTP provider client.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let ledger = match &config.ledger.storage_path {
            Some(path) => CreditLedger::open(path.clone())
                .await
                .context("Failed to open credit ledger")?,
            None => CreditLedger::in_memory(),
        };

        let provider = Arc::new(
            LlmClient::new(
                &config.llm.api_key,
                &config.llm.base_url,
                &config.llm.model,
                config.llm.timeout,
            )
            .context("Failed to create provider client")?,
        );

        Ok(Self::new(
            ledger,
            SessionStore::new(),
            provider,
            config.chat.system_prompt.clone(),
        ))
    }

    /// Process one chat turn end to end.
    ///
    /// Balance is checked twice: a cheap pre-check before any expensive
    /// work, then the authoritative check once the provider has reported
    /// actual token usage. Nothing is reserved in between, so a call can
    /// turn out to cost more than the caller can pay; in that case the
    /// generated text is discarded and nothing is billed.
    #[instrument(skip(self, message, system_prompt), fields(user = %user_id))]
    pub async fn post_chat_message(
        &self,
        user_id: &str,
        message: &str,
        session_id: Option<&str>,
        system_prompt: Option<&str>,
    ) -> ServiceResult<ChatTurnResult> {
        if user_id.trim().is_empty() {
            return Err(ServiceError::Unauthorized);
        }
        if message.trim().is_empty() {
            return Err(ServiceError::Validation("message must not be empty".into()));
        }

        // Fail fast on a misconfigured provider, before touching state.
        self.provider.validate_api_key()?;

        // Resolve the account, granting the opening balance on first use.
        let account = self.ledger.get_or_create_account(user_id).await?;

        // Cheap pre-check: an already-empty balance never reaches the
        // provider. This does not reserve anything.
        if account.balance_micro <= 0 {
            debug!("Pre-check rejected {}: balance {}", user_id, account.balance_micro);
            return Err(ServiceError::InsufficientCredits {
                required_micro: 0,
                available_micro: account.balance_micro,
            });
        }

        let session = self
            .sessions
            .get_or_create_session(user_id, session_id, Some(message))
            .await?;

        // The ordered history IS the prompt context.
        let history = self.sessions.list_messages(&session.id).await?;
        let first_exchange = history.is_empty();
        let context = self.build_context(&history, message, system_prompt);

        info!(
            "Chat turn for {} in session {} ({} prior messages)",
            user_id,
            session.id,
            history.len()
        );

        // External, billable, irreversible. No lock or transaction is
        // held across this await.
        let completion = self.provider.complete(context).await?;

        let usage = completion
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();
        let cost_micro = cost_from_tokens(usage.total_tokens());

        // Authoritative check against this call's actual cost. The
        // provider has already been paid at this point; a rejection here
        // discards the response and bills the user nothing.
        let balance_before = self.ledger.get_balance(user_id).await;
        if balance_before < cost_micro {
            warn!(
                "Discarding response for {}: cost {} exceeds balance {}",
                user_id, cost_micro, balance_before
            );
            return Err(ServiceError::InsufficientCredits {
                required_micro: cost_micro,
                available_micro: balance_before,
            });
        }

        // Persist the exchange, attributing half the cost to each side.
        let (user_cost, assistant_cost) = split_cost(cost_micro);
        self.sessions
            .append_exchange(
                &session.id,
                message,
                Some(usage.input_tokens),
                Some(user_cost),
                &completion.content,
                Some(usage.output_tokens),
                Some(assistant_cost),
            )
            .await?;

        // One debit for the whole turn.
        self.ledger
            .apply_transaction(
                user_id,
                -cost_micro,
                TransactionKind::Debit,
                format!("Chat usage for session {}", session.id),
                TransactionMetadata::chat_usage(&session.id, usage.total_tokens(), cost_micro),
            )
            .await?;

        // First exchange fixes the title from the user message.
        if first_exchange {
            self.sessions
                .set_title(&session.id, derive_title(message))
                .await?;
        }

        self.publish(
            "chat.turn",
            serde_json::json!({
                "user_id": user_id,
                "session_id": session.id,
                "cost_micro": cost_micro,
                "total_tokens": usage.total_tokens(),
            }),
        );

        info!(
            "Charged {} micro ({} tokens) to {}, remaining {}",
            cost_micro,
            usage.total_tokens(),
            user_id,
            balance_before - cost_micro
        );

        Ok(ChatTurnResult {
            session_id: session.id,
            response: completion.content,
            cost_micro,
            remaining_micro: balance_before - cost_micro,
            usage,
        })
    }

    /// A user's sessions, most recently updated first.
    pub async fn list_chat_sessions(&self, user_id: &str) -> ServiceResult<Vec<ChatSession>> {
        self.require_user(user_id)?;
        Ok(self.sessions.list_sessions(user_id).await)
    }

    /// One session with its ordered messages.
    pub async fn get_chat_session(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> ServiceResult<SessionDetail> {
        self.require_user(user_id)?;
        let session = self.sessions.get_owned(user_id, session_id).await?;
        let messages = self.sessions.list_messages(session_id).await?;
        Ok(SessionDetail { session, messages })
    }

    /// Delete a session and all of its messages.
    pub async fn delete_chat_session(&self, user_id: &str, session_id: &str) -> ServiceResult<()> {
        self.require_user(user_id)?;
        self.sessions.delete_session(user_id, session_id).await?;
        self.publish(
            "session.deleted",
            serde_json::json!({ "user_id": user_id, "session_id": session_id }),
        );
        Ok(())
    }

    /// Move a session to a new status. The status arrives as free text
    /// from the boundary and is validated here.
    pub async fn set_chat_session_status(
        &self,
        user_id: &str,
        session_id: &str,
        status: &str,
    ) -> ServiceResult<ChatSession> {
        self.require_user(user_id)?;
        let status = SessionStatus::from_str(status).map_err(ServiceError::Validation)?;
        let session = self.sessions.set_status(user_id, session_id, status).await?;
        self.publish(
            "session.status",
            serde_json::json!({
                "user_id": user_id,
                "session_id": session_id,
                "status": status.to_string(),
            }),
        );
        Ok(session)
    }

    /// Move every session of a user from one status to another.
    pub async fn bulk_transition_sessions(
        &self,
        user_id: &str,
        from: &str,
        to: &str,
    ) -> ServiceResult<(usize, Vec<String>)> {
        self.require_user(user_id)?;
        let from = SessionStatus::from_str(from).map_err(ServiceError::Validation)?;
        let to = SessionStatus::from_str(to).map_err(ServiceError::Validation)?;
        // Same-status moves are rejected inside the store boundary.
        let result = self.sessions.bulk_transition(user_id, from, to).await?;
        Ok(result)
    }

    /// Balance, recent transactions and a 30-day usage summary. Creates
    /// the account lazily so a brand-new user sees the starting grant
    /// instead of an error.
    pub async fn get_credit_balance(&self, user_id: &str) -> ServiceResult<CreditBalanceView> {
        self.require_user(user_id)?;
        let account = self.ledger.get_or_create_account(user_id).await?;
        let recent_transactions = self
            .ledger
            .list_recent_transactions(user_id, RECENT_TRANSACTIONS_LIMIT)
            .await;
        let since: DateTime<Utc> = Utc::now() - chrono::Duration::days(USAGE_WINDOW_DAYS);
        let usage_by_kind = self.ledger.summarize_by_kind(user_id, since).await;

        Ok(CreditBalanceView {
            balance_micro: account.balance_micro,
            recent_transactions,
            usage_by_kind,
        })
    }

    fn require_user(&self, user_id: &str) -> ServiceResult<()> {
        if user_id.trim().is_empty() {
            return Err(ServiceError::Unauthorized);
        }
        Ok(())
    }

    /// Build the provider context: system prompt, prior messages in
    /// order, then the new user message.
    fn build_context(
        &self,
        history: &[ChatMessage],
        message: &str,
        system_prompt: Option<&str>,
    ) -> Vec<Message> {
        let prompt = system_prompt.unwrap_or(&self.system_prompt);
        let mut context = Vec::with_capacity(history.len() + 2);

        if !prompt.is_empty() {
            context.push(Message::system(prompt));
        }

        for msg in history {
            context.push(match msg.role {
                MessageRole::User => Message::user(&msg.content),
                MessageRole::Assistant => Message::assistant(&msg.content),
            });
        }

        context.push(Message::user(message));
        context
    }

    fn publish(&self, kind: &str, payload: serde_json::Value) {
        if let Some(publisher) = &self.publisher {
            publisher.publish(kind, payload);
        }
    }
}
