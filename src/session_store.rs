//! Session State Store: holds the current session and per-session
//! pending-tool buffers.
//!
//! At most one session is live at a time; switching sessions is the
//! processor's job (it also resets the Message Builder when it does). The
//! pending-tool buffer is partitioned by session id so a session switch
//! never cross-pollinates buffered tool calls from the previous session.

use crate::error::ProcessorError;
use crate::model::{Message, MessageMetadata, PendingToolBuffers, Session, ToolCallWithResult};
use std::collections::HashMap;

#[derive(Default)]
pub struct SessionStore {
    current: Option<Session>,
    pending_tools: PendingToolBuffers,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            current: None,
            pending_tools: HashMap::new(),
        }
    }

    /// Replace the current session outright.
    pub fn set_current_session(&mut self, session: Session) {
        self.current = Some(session);
    }

    pub fn get_current_session(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn get_current_session_mut(&mut self) -> Option<&mut Session> {
        self.current.as_mut()
    }

    /// Append `message` to the named session, advancing `updated_at`.
    pub fn append_message(&mut self, session_id: &str, message: Message) -> Result<(), ProcessorError> {
        let session = self.require_current(session_id)?;
        session.messages.push(message);
        session.touch();
        Ok(())
    }

    /// Shallow-merge `patch` into a message's metadata. Only the last
    /// strict-assistant message (per [`Session::last_strict_assistant_index`])
    /// may be targeted this way; anything else is a
    /// [`ProcessorError::NotLastAssistantMessage`], since any other target
    /// would silently corrupt a message tool attachment never intended for.
    pub fn update_message(
        &mut self,
        session_id: &str,
        message_id: &str,
        patch: impl FnOnce(&mut MessageMetadata),
    ) -> Result<(), ProcessorError> {
        let session = self.require_current(session_id)?;
        let index = session
            .messages
            .iter()
            .position(|m| m.id == message_id)
            .ok_or_else(|| ProcessorError::MessageNotFound {
                message_id: message_id.to_string(),
            })?;
        if session.last_strict_assistant_index() != Some(index) {
            return Err(ProcessorError::NotLastAssistantMessage {
                message_id: message_id.to_string(),
            });
        }
        patch(session.messages[index].metadata_mut());
        session.touch();
        Ok(())
    }

    pub fn push_pending_tools(&mut self, session_id: &str, tools: Vec<ToolCallWithResult>) {
        if tools.is_empty() {
            return;
        }
        self.pending_tools
            .entry(session_id.to_string())
            .or_default()
            .extend(tools);
    }

    pub fn drain_pending_tools(&mut self, session_id: &str) -> Vec<ToolCallWithResult> {
        self.pending_tools.remove(session_id).unwrap_or_default()
    }

    pub fn has_pending_tool_calls(&self, session_id: &str) -> bool {
        self.pending_tools
            .get(session_id)
            .map(|buf| !buf.is_empty())
            .unwrap_or(false)
    }

    fn require_current(&mut self, session_id: &str) -> Result<&mut Session, ProcessorError> {
        let session = self.current.as_mut().ok_or(ProcessorError::NoCurrentSession)?;
        if session.session_id != session_id {
            return Err(ProcessorError::SessionIdMismatch {
                current: session.session_id.clone(),
                requested: session_id.to_string(),
            });
        }
        Ok(session)
    }
}
