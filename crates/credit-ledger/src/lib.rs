//! Credit accounts and an append-only transaction ledger.
//!
//! Balances are mechanical accumulators: every mutation goes through
//! [`CreditLedger::apply_transaction`] and leaves one immutable ledger
//! entry behind. Business rules (may this user spend?) live in the
//! caller, not here.

mod error;
mod pricing;
mod store;
mod types;

pub use error::LedgerError;
pub use pricing::{
    cost_from_tokens, format_credits, split_cost, TokenUsage, MICRO_PER_CREDIT,
    STARTING_GRANT_MICRO,
};
pub use store::{CreditLedger, LedgerStats};
pub use types::{CreditAccount, CreditTransaction, TransactionKind, TransactionMetadata};
