//! Inbound event taxonomy: the typed shape of events arriving from the
//! transport, dispatched by [`crate::processor::EventStreamProcessor`].
//!
//! Every event is `{"type": "...", ...}` on the wire. Types this crate does
//! not recognize deserialize into [`ServerEvent::Unknown`] rather than
//! failing — the transport boundary never rejects a message just because a
//! new event type was added upstream.

use crate::model::{MessageFormat, StopReason, ToolCall, ToolResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of a `system_message` event, distinct from `error` (which is
/// always toast-style and never enters the chat transcript).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Discriminates which vendor dialect a `*_user_message` event carries.
/// Kept as a payload field on one `ServerEvent::UserMessage` variant rather
/// than three separate variants, since the handling the processor performs
/// — normalize, stamp sub-session, append — is identical across dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserMessageDialect {
    Generic,
    OpenaiUser,
    AnthropicUser,
}

/// Payload of a `tool_call` event: either a tool being promoted to
/// `executing`, or one or more tools completing with their results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolCallPayload {
    Active {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    Complete {
        tool_calls: Vec<ToolCall>,
        tool_results: Vec<ToolResult>,
    },
}

/// A persisted session record as delivered on `chat_session_changed`,
/// matching the session-persistence format of the external interface
/// contract. `messages` stays as raw `Value`s since each entry may already
/// be in runtime (streamed) form or may still be a vendor `MessageParam`
/// needing the Resumed-History Mapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingSession {
    pub session_id: String,
    #[serde(default)]
    pub token_count: u64,
    #[serde(default)]
    pub context_window_size: Option<u64>,
    #[serde(default)]
    pub session_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub agent_config: Option<crate::model::AgentConfig>,
    #[serde(default)]
    pub messages: Vec<Value>,
}

/// The full inbound event taxonomy recognized at the transport boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "interaction")]
    Interaction { started: bool },

    #[serde(rename = "text_delta")]
    TextDelta {
        session_id: String,
        delta: String,
    },

    #[serde(rename = "thought_delta")]
    ThoughtDelta {
        session_id: String,
        delta: String,
    },

    #[serde(rename = "completion")]
    Completion {
        session_id: String,
        running: bool,
        #[serde(default)]
        input_tokens: Option<u64>,
        #[serde(default)]
        output_tokens: Option<u64>,
        #[serde(default)]
        stop_reason: Option<StopReason>,
    },

    #[serde(rename = "tool_select_delta")]
    ToolSelectDelta {
        session_id: String,
        id: String,
        name: String,
        #[serde(default)]
        arguments: String,
    },

    #[serde(rename = "tool_call")]
    ToolCall {
        session_id: String,
        #[serde(flatten)]
        payload: ToolCallPayload,
    },

    #[serde(rename = "render_media")]
    RenderMedia {
        session_id: String,
        content: String,
        content_type: String,
        #[serde(default)]
        sent_by_class: Option<String>,
        #[serde(default)]
        sent_by_function: Option<String>,
        #[serde(default)]
        foreign_content: Option<bool>,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        name: Option<String>,
    },

    #[serde(rename = "system_message")]
    SystemMessage {
        session_id: String,
        role: String,
        content: String,
        format: MessageFormat,
        severity: Severity,
        #[serde(default)]
        parent_session_id: Option<String>,
        #[serde(default)]
        user_session_id: Option<String>,
    },

    #[serde(rename = "error")]
    Error {
        message: String,
        #[serde(default)]
        source: Option<String>,
    },

    #[serde(rename = "history_delta")]
    HistoryDelta {
        session_id: String,
        messages: Vec<Value>,
    },

    #[serde(rename = "chat_session_changed")]
    ChatSessionChanged {
        session: IncomingSession,
        #[serde(default)]
        user_session_id: Option<String>,
    },

    #[serde(rename = "user_message")]
    #[serde(alias = "openai_user_message")]
    #[serde(alias = "anthropic_user_message")]
    UserMessage {
        #[serde(default)]
        dialect: UserMessageDialect,
        session_id: String,
        content: Value,
        #[serde(default)]
        parent_session_id: Option<String>,
        #[serde(default)]
        user_session_id: Option<String>,
    },

    #[serde(rename = "subsession_started")]
    SubsessionStarted {
        sub_session_type: String,
        sub_agent_type: String,
        #[serde(default)]
        prime_agent_key: Option<String>,
        #[serde(default)]
        sub_agent_key: Option<String>,
    },

    #[serde(rename = "subsession_ended")]
    SubsessionEnded {},

    #[serde(rename = "cancelled")]
    Cancelled { session_id: String },

    #[serde(rename = "history")]
    History {},

    #[serde(rename = "complete_thought")]
    CompleteThought {},

    #[serde(rename = "system_prompt")]
    SystemPrompt {},

    /// Anything not named above. Logged and ignored by the processor.
    #[serde(other)]
    Unknown,
}

impl Default for UserMessageDialect {
    fn default() -> Self {
        UserMessageDialect::Generic
    }
}
