//! Session storage errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    /// Session missing, owned by someone else, or not active.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Rejected status transition (same-status bulk moves).
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}
