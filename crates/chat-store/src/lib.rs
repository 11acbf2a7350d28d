//! Chat sessions and their ordered message history.
//!
//! A session is one conversation thread owned by one user. Messages are
//! appended in user/assistant pairs and read back in insertion order;
//! that ordered sequence is the prompt context for the next model call.

mod error;
mod store;
mod types;

pub use error::SessionError;
pub use store::SessionStore;
pub use types::*;
