//! Resumed-History Mapper: replays a persisted array of vendor-format
//! message parameters as a normalized message list, so the UI rendering
//! path is identical whether a session was just streamed or just loaded.
//!
//! The scan is sequential and single-pass. Assistant messages are expanded
//! block by block; `think`-tool and delegation-tool (`act_`/`ateam_`/`aa_`)
//! uses are special-cased into synthetic messages and subsession markers,
//! consuming their paired `tool_result` from the following message(s) as
//! they go.

use crate::content::{self, ContentInput};
use crate::delegation_grammar;
use crate::model::{Message, MessageContent, MessageFormat, Role, ToolCall, ToolResult};
use serde_json::Value;

/// A subsession boundary or regular tool completion surfaced while
/// replaying history, emitted as its own bus event rather than folded into
/// the produced message list.
#[derive(Debug, Clone)]
pub enum ResumeEvent {
    SubsessionStarted {
        sub_session_type: String,
        sub_agent_type: String,
        prime_agent_key: Option<String>,
        sub_agent_key: Option<String>,
    },
    SubsessionEnded,
    ToolCallComplete { call: ToolCall, result: ToolResult },
}

/// Result of replaying a persisted history: the normalized message list
/// (to be emitted as one atomic `session-messages-loaded`) plus any
/// subsession/tool-completion events encountered along the way, in the
/// order they occurred.
#[derive(Debug, Clone, Default)]
pub struct ResumeOutcome {
    pub messages: Vec<Message>,
    pub events: Vec<ResumeEvent>,
}

/// A single free-standing `MessageParam` → `Message` conversion, used by
/// `history_delta` for messages that are not already in runtime form. Does
/// not perform the assistant block expansion `map_history` does — those
/// deltas are plain single messages, not a history needing tool/thought
/// synthesis.
pub fn basic_message_from_param(value: &Value) -> Option<Message> {
    let role_str = value.get("role").and_then(Value::as_str)?;
    let role = match role_str {
        "user" => Role::User,
        "assistant" => Role::Assistant,
        "system" | "developer" => Role::System,
        _ => return None,
    };
    let content = value.get("content").cloned().unwrap_or(Value::Null);
    let normalized = content::normalize(ContentInput::from_value(&content));
    Some(Message::new(role, normalized, MessageFormat::Text))
}

pub fn map_history(messages: &[Value]) -> ResumeOutcome {
    let mut outcome = ResumeOutcome::default();
    let mut i = 0usize;
    while i < messages.len() {
        let current = &messages[i];
        let role = current.get("role").and_then(Value::as_str).unwrap_or("");
        match role {
            "assistant" => {
                let consumed = expand_assistant_message(messages, i, &mut outcome);
                i += 1 + consumed;
            }
            "user" => {
                let content_value = current.get("content").cloned().unwrap_or(Value::Null);
                if !is_tool_result_array(&content_value) {
                    let normalized = content::normalize(ContentInput::from_value(&content_value));
                    outcome
                        .messages
                        .push(Message::new(Role::User, normalized, MessageFormat::Text));
                }
                i += 1;
            }
            "system" | "developer" => {
                let content_value = current.get("content").cloned().unwrap_or(Value::Null);
                let normalized = content::normalize(ContentInput::from_value(&content_value));
                outcome
                    .messages
                    .push(Message::new(Role::System, normalized, MessageFormat::Text));
                i += 1;
            }
            other => {
                log::debug!("resumed-history mapper: skipping unrecognized role {other:?}");
                i += 1;
            }
        }
    }
    outcome
}

/// Expand one assistant message's content blocks into produced messages and
/// events, returning how many following messages were consumed as matching
/// `tool_result`s.
fn expand_assistant_message(messages: &[Value], index: usize, outcome: &mut ResumeOutcome) -> usize {
    let blocks = as_block_list(messages[index].get("content"));
    let mut text = String::new();
    let mut lookahead = index + 1;

    for block in &blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                text.push_str(block.get("text").and_then(Value::as_str).unwrap_or(""));
            }
            Some("tool_use") => {
                let id = block.get("id").and_then(Value::as_str).unwrap_or_default();
                let name = block.get("name").and_then(Value::as_str).unwrap_or_default();
                let input = block.get("input").cloned().unwrap_or(Value::Null);

                if name == "think" {
                    let thought = input.get("thought").and_then(Value::as_str).unwrap_or_default();
                    outcome.messages.push(Message::new(
                        Role::AssistantThought,
                        MessageContent::text(thought),
                        MessageFormat::Markdown,
                    ));
                    if find_tool_result(messages.get(lookahead), id).is_some() {
                        lookahead += 1;
                    }
                } else if let Some((sub_agent_type_prefix, _)) = delegation_prefix(name) {
                    handle_delegation_tool(messages, &mut lookahead, id, name, &input, sub_agent_type_prefix, outcome);
                } else {
                    if let Some(result_block) = find_tool_result(messages.get(lookahead), id) {
                        let content = tool_result_content_string(result_block);
                        let is_error = result_block.get("is_error").and_then(Value::as_bool);
                        outcome.events.push(ResumeEvent::ToolCallComplete {
                            call: ToolCall {
                                id: id.to_string(),
                                name: name.to_string(),
                                input,
                            },
                            result: ToolResult {
                                tool_use_id: id.to_string(),
                                content,
                                is_error,
                            },
                        });
                        lookahead += 1;
                    } else {
                        log::debug!("resumed-history mapper: tool_use {id} has no matching tool_result");
                    }
                }
            }
            _ => {}
        }
    }

    if !text.is_empty() {
        outcome
            .messages
            .push(Message::new(Role::Assistant, MessageContent::text(text), MessageFormat::Text));
    }

    lookahead - (index + 1)
}

/// Returns `Some("clone")`/`Some("team")` for a delegation-tool name prefix,
/// or `None` if `name` is not a delegation tool.
fn delegation_prefix(name: &str) -> Option<(&'static str, ())> {
    if name.starts_with("act_") {
        Some(("clone", ()))
    } else if name.starts_with("ateam_") || name.starts_with("aa_") {
        Some(("team", ()))
    } else {
        None
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_delegation_tool(
    messages: &[Value],
    lookahead: &mut usize,
    id: &str,
    name: &str,
    input: &Value,
    sub_agent_type: &str,
    outcome: &mut ResumeOutcome,
) {
    let sub_session_type = if name.contains("oneshot") { "oneshot" } else { "chat" };
    let sub_agent_key = input
        .get("agent_key")
        .and_then(Value::as_str)
        .unwrap_or("clone")
        .to_string();

    outcome.events.push(ResumeEvent::SubsessionStarted {
        sub_session_type: sub_session_type.to_string(),
        sub_agent_type: sub_agent_type.to_string(),
        prime_agent_key: None,
        sub_agent_key: Some(sub_agent_key),
    });

    let request = input
        .get("request")
        .and_then(Value::as_str)
        .or_else(|| input.get("message").and_then(Value::as_str))
        .unwrap_or_default();
    let mut user_text = request.to_string();
    if let Some(context) = input.get("process_context").and_then(Value::as_str) {
        user_text = format!("{user_text}\n# Process Context\n\n{context}");
    }
    outcome
        .messages
        .push(Message::new(Role::User, MessageContent::text(user_text), MessageFormat::Text));

    if let Some(result_block) = find_tool_result(messages.get(*lookahead), id) {
        let raw = tool_result_content_string(result_block);
        let parsed = delegation_grammar::extract_delegation_text(&raw);
        outcome
            .messages
            .push(Message::new(Role::Assistant, MessageContent::text(parsed), MessageFormat::Text));
        *lookahead += 1;
    }

    outcome.events.push(ResumeEvent::SubsessionEnded);
}

/// A message's `content` field as a block list: pass arrays through, wrap a
/// plain string as a single synthetic text block (a bare-string assistant
/// message is handled identically to one with an explicit `text` block).
fn as_block_list(content: Option<&Value>) -> Vec<Value> {
    match content {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::String(s)) => vec![serde_json::json!({"type": "text", "text": s})],
        _ => Vec::new(),
    }
}

fn is_tool_result_array(content: &Value) -> bool {
    match content {
        Value::Array(items) => items
            .iter()
            .any(|item| item.get("type").and_then(Value::as_str) == Some("tool_result")),
        _ => false,
    }
}

/// Look for a `tool_result` block matching `tool_use_id` inside `message`,
/// which must be a `user`-role message with array content.
fn find_tool_result<'a>(message: Option<&'a Value>, tool_use_id: &str) -> Option<&'a Value> {
    let message = message?;
    if message.get("role").and_then(Value::as_str) != Some("user") {
        return None;
    }
    let Value::Array(items) = message.get("content")? else {
        return None;
    };
    items.iter().find(|item| {
        item.get("type").and_then(Value::as_str) == Some("tool_result")
            && item.get("tool_use_id").and_then(Value::as_str) == Some(tool_use_id)
    })
}

fn tool_result_content_string(block: &Value) -> String {
    match block.get("content") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_text_exchange_round_trips() {
        let history = vec![
            json!({"role": "user", "content": "hello"}),
            json!({"role": "assistant", "content": [{"type": "text", "text": "hi there"}]}),
        ];
        let outcome = map_history(&history);
        assert_eq!(outcome.messages.len(), 2);
        assert_eq!(outcome.messages[0].role, Role::User);
        assert_eq!(outcome.messages[1].role, Role::Assistant);
        assert_eq!(outcome.messages[1].content, MessageContent::text("hi there"));
        assert!(outcome.events.is_empty());
    }

    #[test]
    fn think_tool_synthesizes_thought_message_and_consumes_result() {
        let history = vec![
            json!({"role": "user", "content": "go"}),
            json!({
                "role": "assistant",
                "content": [{"type": "tool_use", "id": "T1", "name": "think", "input": {"thought": "Processing..."}}]
            }),
            json!({
                "role": "user",
                "content": [{"type": "tool_result", "tool_use_id": "T1", "content": "ack"}]
            }),
            json!({"role": "assistant", "content": [{"type": "text", "text": "Done."}]}),
        ];
        let outcome = map_history(&history);
        assert_eq!(outcome.messages.len(), 3);
        assert_eq!(outcome.messages[1].role, Role::AssistantThought);
        assert_eq!(outcome.messages[1].content, MessageContent::text("Processing..."));
        assert_eq!(outcome.messages[2].content, MessageContent::text("Done."));
    }

    #[test]
    fn delegation_replay_produces_subsession_events_and_messages_in_order() {
        let history = vec![
            json!({"role": "user", "content": "go"}),
            json!({
                "role": "assistant",
                "content": [{
                    "type": "tool_use",
                    "id": "D1",
                    "name": "act_oneshot",
                    "input": {"request": "Analyze", "process_context": "Focus on X", "agent_key": "analyzer"}
                }]
            }),
            json!({
                "role": "user",
                "content": [{"type": "tool_result", "tool_use_id": "D1", "content": "text: 'Done.'"}]
            }),
        ];
        let outcome = map_history(&history);

        assert_eq!(outcome.messages.len(), 3);
        assert_eq!(outcome.messages[0].role, Role::User);
        assert_eq!(outcome.messages[1].role, Role::User);
        assert_eq!(
            outcome.messages[1].content,
            MessageContent::text("Analyze\n# Process Context\n\nFocus on X")
        );
        assert_eq!(outcome.messages[2].role, Role::Assistant);
        assert_eq!(outcome.messages[2].content, MessageContent::text("Done."));

        assert_eq!(outcome.events.len(), 2);
        assert!(matches!(outcome.events[0], ResumeEvent::SubsessionStarted { .. }));
        assert!(matches!(outcome.events[1], ResumeEvent::SubsessionEnded));
        if let ResumeEvent::SubsessionStarted {
            sub_session_type,
            sub_agent_type,
            sub_agent_key,
            ..
        } = &outcome.events[0]
        {
            assert_eq!(sub_session_type, "oneshot");
            assert_eq!(sub_agent_type, "clone");
            assert_eq!(sub_agent_key.as_deref(), Some("analyzer"));
        }
    }

    #[test]
    fn regular_tool_use_emits_tool_call_complete_without_a_message() {
        let history = vec![json!({
            "role": "assistant",
            "content": [{"type": "tool_use", "id": "X", "name": "workspace_read", "input": {"path": "a.rs"}}]
        }), json!({
            "role": "user",
            "content": [{"type": "tool_result", "tool_use_id": "X", "content": "file contents"}]
        })];
        let outcome = map_history(&history);
        assert!(outcome.messages.is_empty());
        assert_eq!(outcome.events.len(), 1);
        assert!(matches!(&outcome.events[0], ResumeEvent::ToolCallComplete { call, result }
            if call.name == "workspace_read" && result.content == "file contents"));
    }

    #[test]
    fn orphaned_tool_result_message_is_skipped() {
        let history = vec![json!({
            "role": "user",
            "content": [{"type": "tool_result", "tool_use_id": "ghost", "content": "x"}]
        })];
        let outcome = map_history(&history);
        assert!(outcome.messages.is_empty());
        assert!(outcome.events.is_empty());
    }
}
