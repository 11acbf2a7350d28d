//! Credit-metered chat service.
//!
//! Ties one chat turn to its cost: resolve the caller's credit account,
//! check the balance, assemble the session history, call the completion
//! provider, convert token usage into credits, persist both sides of
//! the exchange and debit the ledger. Transport, storage engine and the
//! model itself are external collaborators; this crate is the business
//! flow between them.

pub mod config;
pub mod error;
pub mod events;
pub mod service;
pub mod telemetry;

pub use config::Config;
pub use error::{ServiceError, ServiceResult};
pub use events::{EventPublisher, LogPublisher};
pub use service::{ChatService, ChatTurnResult, CreditBalanceView, SessionDetail};
