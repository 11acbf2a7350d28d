//! Credit ledger store.

use crate::error::LedgerError;
use crate::pricing::STARTING_GRANT_MICRO;
use crate::types::{
    CreditAccount, CreditTransaction, TransactionKind, TransactionMetadata, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

/// Data version for schema migrations.
const DATA_VERSION: u32 = 1;

/// Persistent data structure for the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerData {
    /// Schema version for migrations.
    pub version: u32,
    /// Per-user credit accounts.
    pub accounts: HashMap<UserId, CreditAccount>,
    /// Append-only transaction history, oldest first.
    pub transactions: Vec<CreditTransaction>,
}

impl Default for LedgerData {
    fn default() -> Self {
        Self {
            version: DATA_VERSION,
            accounts: HashMap::new(),
            transactions: Vec::new(),
        }
    }
}

/// Credit ledger with an optional JSON snapshot on disk.
///
/// Balance mutations and their ledger appends happen under one write
/// lock, so two racing debits for the same user cannot lose an update.
/// The ledger does not enforce any business rule: a debit that drives a
/// balance negative is applied as asked. The caller pre-validates.
pub struct CreditLedger {
    data: RwLock<LedgerData>,
    storage_path: Option<PathBuf>,
}

impl CreditLedger {
    /// Create an in-memory ledger with no persistence.
    pub fn in_memory() -> Arc<Self> {
        Arc::new(Self {
            data: RwLock::new(LedgerData::default()),
            storage_path: None,
        })
    }

    /// Create a ledger backed by a JSON snapshot, loading existing data
    /// if the file is present.
    pub async fn open(storage_path: PathBuf) -> Result<Arc<Self>, LedgerError> {
        let ledger = Arc::new(Self {
            data: RwLock::new(LedgerData::default()),
            storage_path: Some(storage_path),
        });

        ledger.load().await?;

        Ok(ledger)
    }

    /// Save data to storage with an atomic replace.
    pub async fn persist(&self) -> Result<(), LedgerError> {
        let Some(path) = &self.storage_path else {
            return Ok(());
        };

        let data = self.data.read().await;
        let serialized = serde_json::to_vec_pretty(&*data)?;
        drop(data);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &serialized).await?;
        fs::rename(&temp_path, path).await?;

        debug!("Saved ledger ({} bytes) to {:?}", serialized.len(), path);

        Ok(())
    }

    /// Load data from storage.
    async fn load(&self) -> Result<(), LedgerError> {
        let Some(path) = &self.storage_path else {
            return Ok(());
        };

        if !path.exists() {
            info!("Ledger not found at {:?}, starting fresh", path);
            return Ok(());
        }

        let bytes = fs::read(path).await?;
        let data: LedgerData = serde_json::from_slice(&bytes)?;

        info!(
            "Loaded ledger: {} accounts, {} transactions",
            data.accounts.len(),
            data.transactions.len()
        );

        *self.data.write().await = data;

        Ok(())
    }

    /// Fetch the account for a user, creating it with the starting grant
    /// on first access.
    ///
    /// Creation appends one `bonus` transaction documenting the grant.
    /// The single write lock makes concurrent first calls idempotent:
    /// exactly one grant is ever recorded per user.
    #[instrument(skip(self))]
    pub async fn get_or_create_account(
        &self,
        user_id: &str,
    ) -> Result<CreditAccount, LedgerError> {
        let (account, created) = {
            let mut data = self.data.write().await;

            if let Some(account) = data.accounts.get(user_id) {
                (account.clone(), false)
            } else {
                let account = CreditAccount::new(user_id.to_string(), STARTING_GRANT_MICRO);
                data.accounts.insert(user_id.to_string(), account.clone());
                data.transactions.push(CreditTransaction::new(
                    user_id.to_string(),
                    STARTING_GRANT_MICRO,
                    TransactionKind::Bonus,
                    "Welcome grant",
                    TransactionMetadata::default(),
                ));
                (account, true)
            }
        };

        if created {
            info!("Created account for {} with starting grant", user_id);
            self.persist().await?;
        }

        Ok(account)
    }

    /// Adjust a balance and append one ledger entry.
    ///
    /// Positive amounts increment, negative amounts decrement. No
    /// clamping, no rejection: for debits the caller must have already
    /// validated sufficient balance. Missing accounts are created with
    /// a zero opening balance so the entry always has an owner.
    #[instrument(skip(self, metadata), fields(kind = %kind))]
    pub async fn apply_transaction(
        &self,
        user_id: &str,
        amount_micro: i64,
        kind: TransactionKind,
        description: impl Into<String> + std::fmt::Debug,
        metadata: TransactionMetadata,
    ) -> Result<CreditAccount, LedgerError> {
        let account = {
            let mut data = self.data.write().await;

            data.transactions.push(CreditTransaction::new(
                user_id.to_string(),
                amount_micro,
                kind,
                description,
                metadata,
            ));

            let account = data
                .accounts
                .entry(user_id.to_string())
                .or_insert_with(|| CreditAccount::new(user_id.to_string(), 0));

            account.balance_micro += amount_micro;
            account.updated_at = Utc::now();
            account.clone()
        };

        debug!(
            "Applied {} of {} micro to {}, balance now {}",
            kind, amount_micro, user_id, account.balance_micro
        );

        // Persist outside the lock
        self.persist().await?;

        Ok(account)
    }

    /// Current balance for a user. Unknown users read as the default
    /// starting balance so a brand-new caller never sees an error.
    pub async fn get_balance(&self, user_id: &str) -> i64 {
        let data = self.data.read().await;
        data.accounts
            .get(user_id)
            .map(|a| a.balance_micro)
            .unwrap_or(STARTING_GRANT_MICRO)
    }

    /// Check if a user's balance covers the required amount.
    pub async fn has_sufficient_balance(&self, user_id: &str, required_micro: i64) -> bool {
        self.get_balance(user_id).await >= required_micro
    }

    /// Recent transactions for a user, newest first.
    pub async fn list_recent_transactions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Vec<CreditTransaction> {
        let data = self.data.read().await;
        data.transactions
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Sum of absolute amounts per kind since the given timestamp.
    pub async fn summarize_by_kind(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> HashMap<TransactionKind, i64> {
        let data = self.data.read().await;
        let mut summary = HashMap::new();

        for txn in data
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id && t.created_at >= since)
        {
            *summary.entry(txn.kind).or_insert(0) += txn.amount_micro.abs();
        }

        summary
    }

    /// Summary statistics across all users.
    pub async fn stats(&self) -> LedgerStats {
        let data = self.data.read().await;
        LedgerStats {
            total_accounts: data.accounts.len(),
            total_transactions: data.transactions.len(),
            total_debited_micro: data
                .transactions
                .iter()
                .filter(|t| t.kind == TransactionKind::Debit)
                .map(|t| t.amount_micro.abs())
                .sum(),
        }
    }
}

/// Summary statistics for the ledger.
#[derive(Debug, Clone)]
pub struct LedgerStats {
    pub total_accounts: usize,
    pub total_transactions: usize,
    pub total_debited_micro: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::MICRO_PER_CREDIT;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_fresh_account_gets_starting_grant() {
        let ledger = CreditLedger::in_memory();

        let account = ledger.get_or_create_account("user1").await.unwrap();

        assert_eq!(account.balance_micro, 10 * MICRO_PER_CREDIT);

        let txns = ledger.list_recent_transactions("user1", 10).await;
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].kind, TransactionKind::Bonus);
        assert_eq!(txns[0].amount_micro, 10 * MICRO_PER_CREDIT);
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let ledger = CreditLedger::in_memory();

        ledger.get_or_create_account("user1").await.unwrap();
        let account = ledger.get_or_create_account("user1").await.unwrap();

        assert_eq!(account.balance_micro, 10 * MICRO_PER_CREDIT);
        // Still exactly one grant
        let txns = ledger.list_recent_transactions("user1", 10).await;
        assert_eq!(txns.len(), 1);
    }

    #[tokio::test]
    async fn test_balance_equals_sum_of_applied_amounts() {
        let ledger = CreditLedger::in_memory();
        let start = ledger.get_or_create_account("user1").await.unwrap().balance_micro;

        let amounts: [i64; 5] = [-100_000, 250_000, -75_000, -1, 42];
        for (i, amount) in amounts.iter().enumerate() {
            let kind = if *amount < 0 {
                TransactionKind::Debit
            } else {
                TransactionKind::Credit
            };
            ledger
                .apply_transaction(
                    "user1",
                    *amount,
                    kind,
                    format!("adjustment {}", i),
                    TransactionMetadata::default(),
                )
                .await
                .unwrap();
        }

        let balance = ledger.get_balance("user1").await;
        assert_eq!(balance, start + amounts.iter().sum::<i64>());

        // Ledger consistency: sum of all entries equals the balance
        let txns = ledger.list_recent_transactions("user1", 100).await;
        let ledger_sum: i64 = txns.iter().map(|t| t.amount_micro).sum();
        assert_eq!(ledger_sum, balance);
    }

    #[tokio::test]
    async fn test_debit_is_not_clamped() {
        let ledger = CreditLedger::in_memory();
        ledger.get_or_create_account("user1").await.unwrap();

        // The ledger is a mechanical accumulator; over-debiting is the
        // caller's bug, not ours to reject.
        let account = ledger
            .apply_transaction(
                "user1",
                -20 * MICRO_PER_CREDIT,
                TransactionKind::Debit,
                "oversized debit",
                TransactionMetadata::default(),
            )
            .await
            .unwrap();

        assert_eq!(account.balance_micro, -10 * MICRO_PER_CREDIT);
    }

    #[tokio::test]
    async fn test_unknown_user_reads_default_balance() {
        let ledger = CreditLedger::in_memory();

        assert_eq!(ledger.get_balance("ghost").await, STARTING_GRANT_MICRO);
        assert!(ledger.has_sufficient_balance("ghost", STARTING_GRANT_MICRO).await);
        assert!(!ledger.has_sufficient_balance("ghost", STARTING_GRANT_MICRO + 1).await);
    }

    #[tokio::test]
    async fn test_list_recent_transactions_newest_first() {
        let ledger = CreditLedger::in_memory();
        ledger.get_or_create_account("user1").await.unwrap();

        for i in 0..5 {
            ledger
                .apply_transaction(
                    "user1",
                    -1_000,
                    TransactionKind::Debit,
                    format!("debit {}", i),
                    TransactionMetadata::default(),
                )
                .await
                .unwrap();
        }

        let txns = ledger.list_recent_transactions("user1", 3).await;
        assert_eq!(txns.len(), 3);
        assert_eq!(txns[0].description, "debit 4");
        assert_eq!(txns[1].description, "debit 3");
        assert_eq!(txns[2].description, "debit 2");
    }

    #[tokio::test]
    async fn test_transactions_are_scoped_per_user() {
        let ledger = CreditLedger::in_memory();
        ledger.get_or_create_account("user1").await.unwrap();
        ledger.get_or_create_account("user2").await.unwrap();

        ledger
            .apply_transaction(
                "user2",
                -5_000,
                TransactionKind::Debit,
                "user2 spend",
                TransactionMetadata::default(),
            )
            .await
            .unwrap();

        let txns = ledger.list_recent_transactions("user1", 10).await;
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].kind, TransactionKind::Bonus);
    }

    #[tokio::test]
    async fn test_summarize_by_kind() {
        let ledger = CreditLedger::in_memory();
        let since = Utc::now();
        ledger.get_or_create_account("user1").await.unwrap();

        ledger
            .apply_transaction("user1", -100_000, TransactionKind::Debit, "a", TransactionMetadata::default())
            .await
            .unwrap();
        ledger
            .apply_transaction("user1", -50_000, TransactionKind::Debit, "b", TransactionMetadata::default())
            .await
            .unwrap();
        ledger
            .apply_transaction("user1", 30_000, TransactionKind::Refund, "c", TransactionMetadata::default())
            .await
            .unwrap();

        let summary = ledger.summarize_by_kind("user1", since).await;

        // Absolute sums per kind
        assert_eq!(summary.get(&TransactionKind::Debit), Some(&150_000));
        assert_eq!(summary.get(&TransactionKind::Refund), Some(&30_000));
        assert_eq!(
            summary.get(&TransactionKind::Bonus),
            Some(&STARTING_GRANT_MICRO)
        );
        assert_eq!(summary.get(&TransactionKind::Credit), None);
    }

    #[tokio::test]
    async fn test_summarize_by_kind_respects_since() {
        let ledger = CreditLedger::in_memory();
        ledger.get_or_create_account("user1").await.unwrap();

        // Everything so far predates `since`
        let since = Utc::now();
        ledger
            .apply_transaction("user1", -100, TransactionKind::Debit, "late", TransactionMetadata::default())
            .await
            .unwrap();

        let summary = ledger.summarize_by_kind("user1", since).await;
        assert_eq!(summary.get(&TransactionKind::Debit), Some(&100));
        assert_eq!(summary.get(&TransactionKind::Bonus), None);
    }

    #[tokio::test]
    async fn test_persistence_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ledger.json");

        {
            let ledger = CreditLedger::open(path.clone()).await.unwrap();
            ledger.get_or_create_account("user1").await.unwrap();
            ledger
                .apply_transaction(
                    "user1",
                    -100_000,
                    TransactionKind::Debit,
                    "spend",
                    TransactionMetadata::default(),
                )
                .await
                .unwrap();
        }

        let ledger = CreditLedger::open(path).await.unwrap();
        assert_eq!(
            ledger.get_balance("user1").await,
            10 * MICRO_PER_CREDIT - 100_000
        );
        assert_eq!(ledger.list_recent_transactions("user1", 10).await.len(), 2);
    }

    #[tokio::test]
    async fn test_stats() {
        let ledger = CreditLedger::in_memory();
        ledger.get_or_create_account("user1").await.unwrap();
        ledger.get_or_create_account("user2").await.unwrap();
        ledger
            .apply_transaction("user1", -250_000, TransactionKind::Debit, "spend", TransactionMetadata::default())
            .await
            .unwrap();

        let stats = ledger.stats().await;
        assert_eq!(stats.total_accounts, 2);
        assert_eq!(stats.total_transactions, 3);
        assert_eq!(stats.total_debited_micro, 250_000);
    }
}
