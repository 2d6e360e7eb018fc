//! Structured error type for state-conflict failures.
//!
//! Most of the taxonomy this crate has to handle (malformed content blocks,
//! missing preconditions, delegation-grammar parse failures, cancellation)
//! is handled by construction: the operation is a documented no-op, an
//! auto-bootstrap, or a fallback, never a `Result::Err`. `ProcessorError`
//! exists only for the remaining category — programmer-facing state
//! conflicts that should fail fast rather than silently corrupt session
//! state.

use thiserror::Error;

/// Fails-fast errors surfaced by [`crate::session_store::SessionStore`] and
/// [`crate::processor::EventStreamProcessor`] when a caller violates an
/// ownership invariant the type system can't express on its own.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProcessorError {
    #[error("no current session")]
    NoCurrentSession,

    #[error("session id mismatch: current session is {current}, requested {requested}")]
    SessionIdMismatch { current: String, requested: String },

    #[error("message not found: {message_id}")]
    MessageNotFound { message_id: String },

    #[error("only the last assistant message may be updated this way, got {message_id}")]
    NotLastAssistantMessage { message_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_human_readable() {
        assert_eq!(
            ProcessorError::NoCurrentSession.to_string(),
            "no current session"
        );
        assert_eq!(
            ProcessorError::SessionIdMismatch {
                current: "a".into(),
                requested: "b".into(),
            }
            .to_string(),
            "session id mismatch: current session is a, requested b"
        );
        assert_eq!(
            ProcessorError::MessageNotFound {
                message_id: "m1".into(),
            }
            .to_string(),
            "message not found: m1"
        );
        assert_eq!(
            ProcessorError::NotLastAssistantMessage {
                message_id: "m2".into(),
            }
            .to_string(),
            "only the last assistant message may be updated this way, got m2"
        );
    }
}
