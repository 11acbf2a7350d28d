//! Service error taxonomy.
//!
//! Business errors (`Validation`, `NotFound`, `InsufficientCredits`)
//! keep their specific message for the caller; everything unexpected is
//! logged in full server-side and reduced to a generic message.

use chat_store::SessionError;
use credit_ledger::LedgerError;
use llm_client::LlmError;
use thiserror::Error;

/// Errors surfaced by the chat service.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Malformed input: empty message, invalid status value.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Missing auth context.
    #[error("Missing or invalid authentication")]
    Unauthorized,

    /// Session or resource does not exist for this caller.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Business-rule rejection: the caller cannot cover the cost.
    /// Distinguished from generic failure so the client can prompt a
    /// top-up.
    #[error("Insufficient credits: required {required_micro} micro, available {available_micro} micro")]
    InsufficientCredits {
        required_micro: i64,
        available_micro: i64,
    },

    /// Provider misconfigured or the call failed.
    #[error("AI service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    /// Machine-readable code, separate from the human message.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation_error",
            ServiceError::Unauthorized => "unauthorized",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::InsufficientCredits { .. } => "insufficient_credits",
            ServiceError::ServiceUnavailable(_) => "service_unavailable",
            ServiceError::Internal(_) => "internal_error",
        }
    }
}

impl From<SessionError> for ServiceError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::SessionNotFound(id) => ServiceError::NotFound(format!("session {}", id)),
            SessionError::InvalidTransition(msg) => ServiceError::Validation(msg),
        }
    }
}

impl From<LedgerError> for ServiceError {
    fn from(e: LedgerError) -> Self {
        ServiceError::Internal(e.to_string())
    }
}

impl From<LlmError> for ServiceError {
    fn from(e: LlmError) -> Self {
        ServiceError::ServiceUnavailable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ServiceError::Unauthorized.code(), "unauthorized");
        assert_eq!(
            ServiceError::InsufficientCredits {
                required_micro: 100,
                available_micro: 0
            }
            .code(),
            "insufficient_credits"
        );
        assert_eq!(ServiceError::Validation("x".into()).code(), "validation_error");
    }

    #[test]
    fn test_session_error_mapping() {
        let e: ServiceError = SessionError::SessionNotFound("abc".into()).into();
        assert_eq!(e.code(), "not_found");

        let e: ServiceError = SessionError::InvalidTransition("same status".into()).into();
        assert_eq!(e.code(), "validation_error");
    }

    #[test]
    fn test_provider_error_mapping() {
        let e: ServiceError = LlmError::RateLimit.into();
        assert_eq!(e.code(), "service_unavailable");
    }
}
