//! HTTP client for an OpenAI-compatible chat completion provider.
//!
//! The provider is an opaque external service: it receives the ordered
//! message history and returns generated text plus token usage. Callers
//! depend on the [`ChatProvider`] trait so the network client can be
//! swapped out in tests.

mod client;
mod error;
mod provider;
mod types;

pub use client::LlmClient;
pub use error::LlmError;
pub use provider::ChatProvider;
pub use types::*;
