//! Core domain types: messages, content, tool calls, and sessions.
//!
//! Content arrives in two vendor dialects (Anthropic-style blocks, OpenAI-style
//! parts) but is normalized at the boundary (see [`crate::content`]) into the
//! single runtime shape defined here. Nothing downstream of normalization
//! needs to know which vendor produced a message.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A message's role. `AssistantThought` is a distinct role, not a flag on
/// `Assistant`, so the text/thought exclusivity rule can be enforced purely
/// by type (a message is never both).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "assistant (thought)")]
    AssistantThought,
    #[serde(rename = "system")]
    System,
}

impl Role {
    /// True for the strict `assistant` role only — never for thought messages.
    /// Backward tool attachment must land on one of these, per the invariant
    /// that `message-updated` never targets a thought message.
    pub fn is_strict_assistant(self) -> bool {
        matches!(self, Role::Assistant)
    }

    pub fn is_thought(self) -> bool {
        matches!(self, Role::AssistantThought)
    }
}

/// Rendering hint for a message's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageFormat {
    Text,
    Markdown,
}

/// Why a turn stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Stop,
    Length,
    ToolCalls,
    Cancelled,
}

/// Lifecycle status of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Streaming,
    Complete,
    Cancelled,
}

/// The image source union: a vendor sends either an inline base64 blob or a
/// bare URL, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ImageSource {
    Base64 {
        media_type: Option<String>,
        data: Option<String>,
    },
    Url {
        url: String,
    },
}

/// One part of a multi-part message content array. This is the single
/// canonical shape both vendor dialects collapse into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image")]
    Image { source: ImageSource },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

/// Message content: a plain string, or an ordered array of [`ContentPart`]s.
/// `normalize` collapses an all-text array down to the string form; this
/// enum still needs to represent both because not every content array is
/// all-text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    pub fn text(s: impl Into<String>) -> Self {
        MessageContent::Text(s.into())
    }

    /// Borrow this content as a plain string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MessageContent::Text(s) => Some(s),
            MessageContent::Parts(_) => None,
        }
    }

    pub fn is_empty_text(&self) -> bool {
        matches!(self, MessageContent::Text(s) if s.is_empty())
    }
}

/// A tool invocation requested by the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// The result produced by running a [`ToolCall`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_use_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

/// A completed call paired with its result, as attached to a message or held
/// in a session's pending-tool buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallWithResult {
    pub call: ToolCall,
    pub result: ToolResult,
}

/// Lifecycle status of an in-progress tool notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Preparing,
    Executing,
    Complete,
}

/// A UI-facing notification tracking one tool call's progress. Distinct from
/// [`ToolCall`]: a notification exists only while the tool is active, and
/// carries display fields (serialized arguments, timestamp) the finalized
/// call+result pair does not need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolNotification {
    pub id: String,
    pub tool_name: String,
    pub status: ToolStatus,
    pub session_id: String,
    pub timestamp: String,
    pub arguments: String,
}

/// Marks a message as belonging to a nested agent turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubSessionMarker {
    pub session_id: String,
    pub parent_session_id: Option<String>,
    pub user_session_id: Option<String>,
}

/// Metadata attached to a finalized (or backward-updated) message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_results: Option<Vec<ToolResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_session: Option<SubSessionMarker>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_sub_session: Option<bool>,
}

impl MessageMetadata {
    /// Append a completed tool call+result pair, creating the backing arrays
    /// on first use. Used by both backward attachment and pending-buffer
    /// drain, which must accumulate across multiple events identically.
    pub fn push_tool_call_result(&mut self, pair: ToolCallWithResult) {
        self.tool_calls
            .get_or_insert_with(Vec::new)
            .push(pair.call);
        self.tool_results
            .get_or_insert_with(Vec::new)
            .push(pair.result);
    }
}

/// A single chat-session message. Role is immutable after construction;
/// tool attachments are only ever added to `metadata` on `assistant`-role
/// messages, never on `assistant (thought)` ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: MessageContent,
    pub timestamp: String,
    pub format: MessageFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MessageStatus>,
}

impl Message {
    pub fn new(role: Role, content: MessageContent, format: MessageFormat) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content,
            timestamp: now_iso8601(),
            format,
            metadata: None,
            status: None,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut MessageMetadata {
        self.metadata.get_or_insert_with(MessageMetadata::default)
    }
}

/// Current RFC 3339 timestamp, used wherever the spec calls for an
/// ISO-8601 string.
pub fn now_iso8601() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

/// Which LLM vendor produced a session's history, detected from
/// `agent_config.model_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    Anthropic,
    Openai,
    None,
}

impl Vendor {
    /// `model_id` containing `claude`/`anthropic` → Anthropic; containing
    /// `gpt`/`openai` → Openai; otherwise None. Matching is case-insensitive
    /// substring search, exactly as described for the resume path.
    pub fn detect_from_model_id(model_id: Option<&str>) -> Vendor {
        let Some(id) = model_id else {
            return Vendor::None;
        };
        let lower = id.to_lowercase();
        if lower.contains("claude") || lower.contains("anthropic") {
            Vendor::Anthropic
        } else if lower.contains("gpt") || lower.contains("openai") {
            Vendor::Openai
        } else {
            Vendor::None
        }
    }
}

/// A chat session: its ordered messages plus bookkeeping the store and
/// processor need (token accounting, vendor, display name).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub messages: Vec<Message>,
    pub token_count: u64,
    pub context_window_size: Option<u64>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_config: Option<AgentConfig>,
    pub vendor: Vendor,
    pub display_name: String,
}

/// The slice of a session's persisted agent configuration this crate reads.
/// A host's real config type almost certainly has more fields; only what
/// vendor detection and display-name resolution need is modeled here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub agent_name: Option<String>,
}

impl Session {
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = now_iso8601();
        let session_id = session_id.into();
        Self {
            session_id: session_id.clone(),
            messages: Vec::new(),
            token_count: 0,
            context_window_size: None,
            created_at: now.clone(),
            updated_at: now,
            user_id: None,
            metadata: None,
            agent_config: None,
            vendor: Vendor::None,
            display_name: session_id,
        }
    }

    /// `session_name`, else `"New chat with " + agent_name`, matching the
    /// resume-path default-name rule.
    pub fn resolve_display_name(session_name: Option<&str>, agent_name: Option<&str>) -> String {
        if let Some(name) = session_name {
            if !name.is_empty() {
                return name.to_string();
            }
        }
        format!("New chat with {}", agent_name.unwrap_or("agent"))
    }

    pub fn touch(&mut self) {
        self.updated_at = now_iso8601();
    }

    /// Scan backward from the end of this session's messages, skipping
    /// thought-role messages, until a strict `assistant` message is found.
    /// This is the lookup half of backward tool attachment (§4.E); mutation
    /// is the caller's responsibility since it must also emit `message-updated`.
    pub fn last_strict_assistant_index(&self) -> Option<usize> {
        for (idx, message) in self.messages.iter().enumerate().rev() {
            if message.role.is_strict_assistant() {
                return Some(idx);
            }
            if message.role.is_thought() {
                continue;
            }
            // Any other role (user, system) terminates the scan: only a
            // contiguous run of thought messages may be skipped over.
            break;
        }
        None
    }
}

/// Extra context carried alongside a rendered media item, describing where
/// it originated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_by_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_by_function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_content: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A rendered media item produced from a `render_media` event. Always
/// `role: assistant`, `status: complete` — media is never streamed
/// incrementally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// The exact MIME string from the originating event (e.g.
    /// `text/markdown`). Never transformed — rendering it is the UI's job.
    pub content_type: String,
    pub timestamp: String,
    pub status: MessageStatus,
    pub metadata: MediaMetadata,
}

impl MediaItem {
    pub fn new(content: String, content_type: String, metadata: MediaMetadata) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content,
            content_type,
            timestamp: now_iso8601(),
            status: MessageStatus::Complete,
            metadata,
        }
    }
}

/// Per-session-id queue of completed tool calls awaiting attachment to the
/// next assistant message. Named as its own type because ownership and
/// draining discipline matter even though it is structurally a `Vec`.
pub type PendingToolBuffer = Vec<ToolCallWithResult>;

/// Per-session pending-tool buffers, partitioned by session id so a session
/// switch never cross-pollinates buffered tool calls.
pub type PendingToolBuffers = HashMap<String, PendingToolBuffer>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_strict_assistant_excludes_thought() {
        assert!(Role::Assistant.is_strict_assistant());
        assert!(!Role::AssistantThought.is_strict_assistant());
        assert!(!Role::User.is_strict_assistant());
    }

    #[test]
    fn role_serializes_with_spec_literal_tags() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::AssistantThought).unwrap(),
            "\"assistant (thought)\""
        );
    }

    #[test]
    fn vendor_detection_matches_substrings_case_insensitively() {
        assert_eq!(
            Vendor::detect_from_model_id(Some("claude-3-5-sonnet")),
            Vendor::Anthropic
        );
        assert_eq!(
            Vendor::detect_from_model_id(Some("Anthropic.Claude")),
            Vendor::Anthropic
        );
        assert_eq!(
            Vendor::detect_from_model_id(Some("gpt-4o")),
            Vendor::Openai
        );
        assert_eq!(Vendor::detect_from_model_id(Some("llama-3")), Vendor::None);
        assert_eq!(Vendor::detect_from_model_id(None), Vendor::None);
    }

    #[test]
    fn display_name_falls_back_to_agent_name() {
        assert_eq!(
            Session::resolve_display_name(None, Some("Ada")),
            "New chat with Ada"
        );
        assert_eq!(
            Session::resolve_display_name(Some(""), Some("Ada")),
            "New chat with Ada"
        );
        assert_eq!(
            Session::resolve_display_name(Some("Trip planning"), Some("Ada")),
            "Trip planning"
        );
    }

    #[test]
    fn last_strict_assistant_index_skips_thought_messages() {
        let mut session = Session::new("s1");
        session.messages.push(Message::new(
            Role::User,
            MessageContent::text("hi"),
            MessageFormat::Text,
        ));
        session.messages.push(Message::new(
            Role::Assistant,
            MessageContent::text("hello"),
            MessageFormat::Text,
        ));
        session.messages.push(Message::new(
            Role::AssistantThought,
            MessageContent::text("pondering"),
            MessageFormat::Markdown,
        ));

        assert_eq!(session.last_strict_assistant_index(), Some(1));
    }

    #[test]
    fn last_strict_assistant_index_none_when_user_intervenes() {
        let mut session = Session::new("s1");
        session.messages.push(Message::new(
            Role::Assistant,
            MessageContent::text("hello"),
            MessageFormat::Text,
        ));
        session.messages.push(Message::new(
            Role::User,
            MessageContent::text("thanks"),
            MessageFormat::Text,
        ));

        assert_eq!(session.last_strict_assistant_index(), None);
    }

    #[test]
    fn metadata_accumulates_across_multiple_pushes() {
        let mut meta = MessageMetadata::default();
        meta.push_tool_call_result(ToolCallWithResult {
            call: ToolCall {
                id: "t1".into(),
                name: "workspace_read".into(),
                input: Value::Null,
            },
            result: ToolResult {
                tool_use_id: "t1".into(),
                content: "contents".into(),
                is_error: None,
            },
        });
        meta.push_tool_call_result(ToolCallWithResult {
            call: ToolCall {
                id: "t2".into(),
                name: "workspace_write".into(),
                input: Value::Null,
            },
            result: ToolResult {
                tool_use_id: "t2".into(),
                content: "ok".into(),
                is_error: None,
            },
        });

        assert_eq!(meta.tool_calls.as_ref().unwrap().len(), 2);
        assert_eq!(meta.tool_results.as_ref().unwrap().len(), 2);
    }
}
