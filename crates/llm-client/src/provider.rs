//! Provider abstraction.

use crate::error::LlmError;
use crate::types::{Completion, Message};
use async_trait::async_trait;

/// A chat completion provider.
///
/// The seam between the billing flow and the network: production code
/// uses [`crate::LlmClient`], tests substitute a scripted double so no
/// call ever leaves the process.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Misconfiguration precondition, checked before any call.
    fn validate_api_key(&self) -> Result<(), LlmError>;

    /// Send the ordered message history and get the reply plus usage.
    async fn complete(&self, messages: Vec<Message>) -> Result<Completion, LlmError>;
}
