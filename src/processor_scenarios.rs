//! Boundary-scenario tests for [`super::EventStreamProcessor`], kept as a
//! sibling file the way the teacher separates `execution_tests.rs` from
//! `execution.rs`.

use super::test_support::{labels, recorder, start_session};
use super::*;
use crate::events::UserMessageDialect;
use crate::model::{MessageContent, StopReason, ToolCall, ToolResult};
use serde_json::json;

#[test]
fn pure_text_stream_emits_streaming_then_complete_then_appends() {
    let mut processor = EventStreamProcessor::new();
    start_session(&mut processor, "s1");
    let events = recorder(&processor);

    processor.process_event(ServerEvent::TextDelta {
        session_id: "s1".into(),
        delta: "Hello".into(),
    });
    processor.process_event(ServerEvent::TextDelta {
        session_id: "s1".into(),
        delta: ", world.".into(),
    });
    processor.process_event(ServerEvent::Completion {
        session_id: "s1".into(),
        running: false,
        input_tokens: Some(10),
        output_tokens: Some(5),
        stop_reason: Some(StopReason::Stop),
    });

    let recorded = events.lock().unwrap();
    assert_eq!(labels(&recorded), vec!["message-streaming", "message-streaming", "message-complete"]);
    let session = processor.store().get_current_session().unwrap();
    assert_eq!(session.messages.len(), 1);
    assert_eq!(session.messages[0].content, MessageContent::text("Hello, world."));
    assert_eq!(session.token_count, 15);
}

#[test]
fn think_tool_interleave_finalizes_thought_then_removes_notification() {
    let mut processor = EventStreamProcessor::new();
    start_session(&mut processor, "s1");

    processor.process_event(ServerEvent::ToolSelectDelta {
        session_id: "s1".into(),
        id: "T1".into(),
        name: "think".into(),
        arguments: "{}".into(),
    });

    let events = recorder(&processor);

    processor.process_event(ServerEvent::ThoughtDelta {
        session_id: "s1".into(),
        delta: "Processing...".into(),
    });
    processor.process_event(ServerEvent::TextDelta {
        session_id: "s1".into(),
        delta: "Done.".into(),
    });
    processor.process_event(ServerEvent::Completion {
        session_id: "s1".into(),
        running: false,
        input_tokens: Some(1),
        output_tokens: Some(1),
        stop_reason: Some(StopReason::Stop),
    });

    let recorded = events.lock().unwrap();
    assert_eq!(
        labels(&recorded),
        vec![
            "tool-notification-removed",
            "message-streaming",
            "message-complete",
            "message-streaming",
            "message-complete",
        ]
    );
    let session = processor.store().get_current_session().unwrap();
    assert_eq!(session.messages.len(), 2);
    assert_eq!(session.messages[0].role, Role::AssistantThought);
    assert_eq!(session.messages[1].role, Role::Assistant);
}

#[test]
fn backward_tool_attachment_updates_the_last_assistant_message() {
    let mut processor = EventStreamProcessor::new();
    start_session(&mut processor, "s1");

    processor.process_event(ServerEvent::TextDelta {
        session_id: "s1".into(),
        delta: "Answer.".into(),
    });
    processor.process_event(ServerEvent::Completion {
        session_id: "s1".into(),
        running: false,
        input_tokens: Some(1),
        output_tokens: Some(1),
        stop_reason: Some(StopReason::ToolCalls),
    });

    let events = recorder(&processor);
    processor.process_event(ServerEvent::ToolCall {
        session_id: "s1".into(),
        payload: ToolCallPayload::Complete {
            tool_calls: vec![ToolCall {
                id: "c1".into(),
                name: "workspace_read".into(),
                input: json!({"path": "a.rs"}),
            }],
            tool_results: vec![ToolResult {
                tool_use_id: "c1".into(),
                content: "contents".into(),
                is_error: None,
            }],
        },
    });

    let recorded = events.lock().unwrap();
    assert_eq!(labels(&recorded), vec!["tool-call-complete", "tool-notification-removed", "message-updated"]);
    let session = processor.store().get_current_session().unwrap();
    let updated = &session.messages[0];
    assert_eq!(updated.metadata.as_ref().unwrap().tool_calls.as_ref().unwrap().len(), 1);
}

#[test]
fn tool_call_with_no_prior_assistant_message_is_buffered() {
    let mut processor = EventStreamProcessor::new();
    start_session(&mut processor, "s1");

    processor.process_event(ServerEvent::ToolCall {
        session_id: "s1".into(),
        payload: ToolCallPayload::Complete {
            tool_calls: vec![ToolCall {
                id: "c1".into(),
                name: "workspace_read".into(),
                input: json!({}),
            }],
            tool_results: vec![ToolResult {
                tool_use_id: "c1".into(),
                content: "contents".into(),
                is_error: None,
            }],
        },
    });
    assert!(processor.store.has_pending_tool_calls("s1"));

    processor.process_event(ServerEvent::TextDelta {
        session_id: "s1".into(),
        delta: "Here you go.".into(),
    });
    processor.process_event(ServerEvent::Completion {
        session_id: "s1".into(),
        running: false,
        input_tokens: Some(1),
        output_tokens: Some(1),
        stop_reason: Some(StopReason::Stop),
    });

    let session = processor.store().get_current_session().unwrap();
    assert_eq!(session.messages[0].metadata.as_ref().unwrap().tool_calls.as_ref().unwrap().len(), 1);
    assert!(!processor.store.has_pending_tool_calls("s1"));
}

#[test]
fn cancelled_finalizes_the_partial_message_then_emits_response_cancelled() {
    let mut processor = EventStreamProcessor::new();
    start_session(&mut processor, "s1");

    let events = recorder(&processor);
    processor.process_event(ServerEvent::TextDelta {
        session_id: "s1".into(),
        delta: "par".into(),
    });
    processor.process_event(ServerEvent::TextDelta {
        session_id: "s1".into(),
        delta: "tial".into(),
    });
    processor.process_event(ServerEvent::Cancelled { session_id: "s1".into() });

    let recorded = events.lock().unwrap();
    assert_eq!(
        labels(&recorded),
        vec!["message-streaming", "message-streaming", "message-complete", "response-cancelled"]
    );
    assert!(!processor.builder.has_current());
    let session = processor.store().get_current_session().unwrap();
    assert_eq!(session.messages.len(), 1);
    assert_eq!(session.messages[0].content, MessageContent::text("partial"));
    assert_eq!(
        session.messages[0].metadata.as_ref().and_then(|m| m.stop_reason),
        Some(StopReason::Cancelled)
    );
}

#[test]
fn user_message_in_a_sub_session_is_stamped() {
    let mut processor = EventStreamProcessor::new();
    start_session(&mut processor, "s1");

    let events = recorder(&processor);
    processor.process_event(ServerEvent::UserMessage {
        dialect: UserMessageDialect::Generic,
        session_id: "sub-1".into(),
        content: json!("delegate this"),
        parent_session_id: None,
        user_session_id: Some("s1".into()),
    });

    let recorded = events.lock().unwrap();
    assert!(matches!(
        recorded.iter().find(|e| matches!(e, OutboundEvent::MessageAdded { .. })),
        Some(OutboundEvent::MessageAdded { message, .. }) if message.metadata.as_ref().unwrap().is_sub_session == Some(true)
    ));
}
