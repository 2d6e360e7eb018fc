//! Event Stream Processor: the stateful dispatcher that turns inbound
//! [`ServerEvent`]s into normalized session mutations and [`OutboundEvent`]s.
//!
//! One processor instance owns exactly one session's worth of streaming
//! state (the Message Builder and Tool Call Manager) plus the Session State
//! Store. `process_event` never returns a `Result` — every malformed or
//! out-of-order input is absorbed by falling back or logging, per the
//! error-handling design; only the store's own state-conflict guards can
//! fail, and those are swallowed here too (logged, not propagated), since a
//! conflicting update from a stale event is itself something to skip, not
//! something the caller should have to handle.

use crate::content::{self, ContentInput};
use crate::event_bus::{EventBus, OutboundEvent};
use crate::events::{IncomingSession, ServerEvent, ToolCallPayload};
use crate::message_builder::{CurrentKind, MessageBuilder};
use crate::model::{
    self, MediaItem, MediaMetadata, Message, MessageFormat, MessageMetadata, Role, Session, StopReason,
    SubSessionMarker, ToolCall, ToolCallWithResult, ToolResult, Vendor,
};
use crate::resume::{self, ResumeEvent};
use crate::session_store::SessionStore;
use crate::tool_manager::ToolCallManager;

/// Owns one session's live streaming state and dispatches inbound events
/// against it.
pub struct EventStreamProcessor {
    builder: MessageBuilder,
    tools: ToolCallManager,
    store: SessionStore,
    bus: EventBus,
    user_session_id: Option<String>,
}

impl EventStreamProcessor {
    pub fn new() -> Self {
        Self {
            builder: MessageBuilder::new(),
            tools: ToolCallManager::new(),
            store: SessionStore::new(),
            bus: EventBus::new(),
            user_session_id: None,
        }
    }

    /// The bus subscribers register against to receive [`OutboundEvent`]s.
    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// The top-level user session id a sub-session is nested under.
    /// Distinct from the Session State Store's current session: a
    /// `chat_session_changed` for a sub-agent turn replaces the current
    /// session without changing this.
    pub fn set_user_session_id(&mut self, id: impl Into<String>) {
        self.user_session_id = Some(id.into());
    }

    /// Idempotent cleanup of the Message Builder and Tool Call Manager.
    /// Does not touch the Session State Store — a reset mid-turn discards
    /// only the in-progress streaming state, not the session's history.
    pub fn reset(&mut self) {
        self.builder.reset();
        self.tools.reset();
    }

    /// Full teardown, for when the processor itself is being retired.
    pub fn destroy(&mut self) {
        self.reset();
        self.user_session_id = None;
    }

    pub fn process_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Interaction { started } => self.handle_interaction(started),
            ServerEvent::TextDelta { session_id, delta } => self.handle_text_delta(&session_id, &delta),
            ServerEvent::ThoughtDelta { session_id, delta } => self.handle_thought_delta(&session_id, &delta),
            ServerEvent::Completion {
                session_id,
                running,
                input_tokens,
                output_tokens,
                stop_reason,
            } => self.handle_completion(&session_id, running, input_tokens, output_tokens, stop_reason),
            ServerEvent::ToolSelectDelta {
                session_id,
                id,
                name,
                arguments,
            } => self.handle_tool_select_delta(&session_id, &id, &name, &arguments),
            ServerEvent::ToolCall { session_id, payload } => self.handle_tool_call(&session_id, payload),
            ServerEvent::RenderMedia {
                session_id,
                content,
                content_type,
                sent_by_class,
                sent_by_function,
                foreign_content,
                url,
                name,
            } => self.handle_render_media(
                &session_id,
                content,
                content_type,
                sent_by_class,
                sent_by_function,
                foreign_content,
                url,
                name,
            ),
            ServerEvent::SystemMessage {
                session_id,
                role,
                content,
                format,
                severity,
                parent_session_id,
                user_session_id,
            } => self.bus.publish(OutboundEvent::SystemMessage {
                session_id,
                role,
                content,
                format,
                severity,
                parent_session_id,
                user_session_id,
            }),
            ServerEvent::Error { message, source } => self.bus.publish(OutboundEvent::Error {
                message,
                source,
                timestamp: model::now_iso8601(),
            }),
            ServerEvent::HistoryDelta { session_id, messages } => self.handle_history_delta(&session_id, messages),
            ServerEvent::ChatSessionChanged { session, user_session_id } => {
                self.handle_chat_session_changed(session, user_session_id)
            }
            ServerEvent::UserMessage {
                dialect: _,
                session_id,
                content,
                parent_session_id,
                user_session_id,
            } => self.handle_user_message(&session_id, content, parent_session_id, user_session_id),
            ServerEvent::SubsessionStarted {
                sub_session_type,
                sub_agent_type,
                prime_agent_key,
                sub_agent_key,
            } => self.bus.publish(OutboundEvent::SubsessionStarted {
                sub_session_type,
                sub_agent_type,
                prime_agent_key,
                sub_agent_key,
            }),
            ServerEvent::SubsessionEnded {} => self.bus.publish(OutboundEvent::SubsessionEnded),
            ServerEvent::Cancelled { session_id } => self.handle_cancelled(&session_id),
            ServerEvent::History {} | ServerEvent::CompleteThought {} | ServerEvent::SystemPrompt {} => {
                log::debug!("event stream processor: event type carries no processor-side behavior, ignoring");
            }
            ServerEvent::Unknown => {
                log::debug!("event stream processor: received an unrecognized event type, ignoring");
            }
        }
    }

    fn handle_interaction(&mut self, started: bool) {
        if started {
            self.reset();
        }
    }

    fn handle_text_delta(&mut self, session_id: &str, delta: &str) {
        if self.builder.has_current() && self.builder.current_type() != Some(CurrentKind::Text) {
            self.finalize_and_append(session_id, None);
        }
        if !self.builder.has_current() {
            self.builder.start(CurrentKind::Text);
        }
        self.builder.append_text(delta);
        if let Some(message) = self.builder.current() {
            self.bus.publish(OutboundEvent::MessageStreaming {
                session_id: session_id.to_string(),
                message: message.clone(),
            });
        }
    }

    fn handle_thought_delta(&mut self, session_id: &str, delta: &str) {
        if self.builder.has_current() && self.builder.current_type() != Some(CurrentKind::Thought) {
            self.finalize_and_append(session_id, None);
        }
        if !self.builder.has_current() {
            self.builder.start(CurrentKind::Thought);
        }
        self.builder.append_text(delta);

        for tool_call_id in self.tools.remove_active_by_name("think") {
            self.bus.publish(OutboundEvent::ToolNotificationRemoved {
                session_id: session_id.to_string(),
                tool_call_id,
            });
        }

        if let Some(message) = self.builder.current() {
            self.bus.publish(OutboundEvent::MessageStreaming {
                session_id: session_id.to_string(),
                message: message.clone(),
            });
        }
    }

    /// Finalize the in-flight message (if any), append it to the current
    /// session, and emit `message-complete`. Shared by the text/thought
    /// switch path and by `completion`.
    fn finalize_and_append(&mut self, session_id: &str, meta: Option<MessageMetadata>) -> Option<Message> {
        let message = self.builder.finalize(meta)?;
        if let Err(err) = self.store.append_message(session_id, message.clone()) {
            log::debug!("event stream processor: dropping finalized message, {err}");
            return None;
        }
        self.bus.publish(OutboundEvent::MessageComplete {
            session_id: session_id.to_string(),
            message: message.clone(),
        });
        Some(message)
    }

    fn handle_completion(
        &mut self,
        session_id: &str,
        running: bool,
        input_tokens: Option<u64>,
        output_tokens: Option<u64>,
        stop_reason: Option<StopReason>,
    ) {
        if running {
            return;
        }
        if !self.builder.has_current() {
            return;
        }

        let mut meta = MessageMetadata {
            input_tokens,
            output_tokens,
            stop_reason,
            ..Default::default()
        };
        for pair in self.tools.drain_completed() {
            meta.push_tool_call_result(pair);
        }
        for pair in self.store.drain_pending_tools(session_id) {
            meta.push_tool_call_result(pair);
        }

        if self.finalize_and_append(session_id, Some(meta)).is_some() {
            let turn_tokens = input_tokens.unwrap_or(0) + output_tokens.unwrap_or(0);
            if let Some(session) = self.store.get_current_session_mut() {
                session.token_count += turn_tokens;
            }
        }
    }

    fn handle_tool_select_delta(&mut self, session_id: &str, id: &str, name: &str, arguments: &str) {
        let timestamp = model::now_iso8601();
        let notification = self
            .tools
            .on_tool_select(id, name, session_id, arguments, &timestamp)
            .clone();
        self.bus.publish(OutboundEvent::ToolNotification { notification });
    }

    fn handle_tool_call(&mut self, session_id: &str, payload: ToolCallPayload) {
        match payload {
            ToolCallPayload::Active { id, name, input } => {
                let timestamp = model::now_iso8601();
                let arguments = input.to_string();
                let notification = self
                    .tools
                    .on_tool_call_active(&id, &name, session_id, &arguments, &timestamp)
                    .clone();
                self.bus.publish(OutboundEvent::ToolNotification { notification });
            }
            ToolCallPayload::Complete { tool_calls, tool_results } => {
                // A lone completing `think` call has no result to display:
                // its notification is simply removed, the same as when the
                // thought stream starts.
                if let [only] = tool_calls.as_slice() {
                    if only.name == "think" {
                        self.tools.remove_active(&only.id);
                        self.bus.publish(OutboundEvent::ToolNotificationRemoved {
                            session_id: session_id.to_string(),
                            tool_call_id: only.id.clone(),
                        });
                        return;
                    }
                }

                let pairs = pair_calls_with_results(tool_calls, tool_results);
                if pairs.is_empty() {
                    return;
                }

                let ids: Vec<String> = pairs.iter().map(|p| p.call.id.clone()).collect();
                self.bus.publish(OutboundEvent::ToolCallComplete {
                    tool_calls: pairs.iter().map(|p| p.call.clone()).collect(),
                    tool_results: pairs.iter().map(|p| p.result.clone()).collect(),
                });
                for tool_call_id in &ids {
                    self.bus.publish(OutboundEvent::ToolNotificationRemoved {
                        session_id: session_id.to_string(),
                        tool_call_id: tool_call_id.clone(),
                    });
                }

                if self.builder.has_current() {
                    // The assistant message is still streaming; the Manager
                    // holds the pair until that message finalizes and
                    // `completion` drains it.
                    self.tools.on_tool_call_complete(pairs);
                } else {
                    // The assistant message already finalized (or never
                    // started): attach backward instead, buffering if no
                    // target is found.
                    for id in &ids {
                        self.tools.remove_active(id);
                    }
                    self.attach_tool_calls_backward(session_id, pairs);
                }
            }
        }
    }

    /// Backward tool attachment (Â§4.E): find the last strict `assistant`
    /// message and merge the completed pairs into its metadata, emitting
    /// `message-updated`. If no such message exists — no session, an empty
    /// session, or only user/thought messages precede — the pairs are
    /// buffered for the next completing assistant message instead.
    fn attach_tool_calls_backward(&mut self, session_id: &str, pairs: Vec<ToolCallWithResult>) {
        let Some(index) = self.store.get_current_session().and_then(|s| s.last_strict_assistant_index()) else {
            self.store.push_pending_tools(session_id, pairs);
            return;
        };
        let Some(session) = self.store.get_current_session() else {
            return;
        };
        let message_id = session.messages[index].id.clone();

        let updated = self.store.update_message(session_id, &message_id, |meta| {
            for pair in pairs {
                meta.push_tool_call_result(pair);
            }
        });
        if updated.is_err() {
            log::debug!("event stream processor: backward tool attachment failed, {}", updated.unwrap_err());
            return;
        }

        if let Some(message) = self
            .store
            .get_current_session()
            .and_then(|s| s.messages.iter().find(|m| m.id == message_id))
            .cloned()
        {
            self.bus.publish(OutboundEvent::MessageUpdated {
                session_id: session_id.to_string(),
                message_id,
                message,
            });
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_render_media(
        &mut self,
        session_id: &str,
        content: String,
        content_type: String,
        sent_by_class: Option<String>,
        sent_by_function: Option<String>,
        foreign_content: Option<bool>,
        url: Option<String>,
        name: Option<String>,
    ) {
        let metadata = MediaMetadata {
            sent_by_class,
            sent_by_function,
            foreign_content,
            url,
            name,
        };
        let media = MediaItem::new(content, content_type, metadata);
        self.bus.publish(OutboundEvent::MediaAdded {
            session_id: session_id.to_string(),
            media,
        });
    }

    fn handle_history_delta(&mut self, session_id: &str, messages: Vec<serde_json::Value>) {
        let mut converted = Vec::new();
        for value in messages {
            let message = if value.get("timestamp").is_some() {
                serde_json::from_value::<Message>(value).ok()
            } else {
                resume::basic_message_from_param(&value)
            };
            if let Some(message) = message {
                converted.push(message);
            }
        }
        for message in converted {
            if let Err(err) = self.store.append_message(session_id, message) {
                log::debug!("event stream processor: dropping history_delta message, {err}");
            }
        }
        if let Some(session) = self.store.get_current_session().cloned() {
            self.bus.publish(OutboundEvent::SessionsUpdated { sessions: vec![session] });
        }
    }

    fn handle_chat_session_changed(&mut self, incoming: IncomingSession, event_user_session_id: Option<String>) {
        let resolved_user_session_id = event_user_session_id.unwrap_or_else(|| incoming.session_id.clone());
        self.set_user_session_id(resolved_user_session_id);

        let model_id = incoming.agent_config.as_ref().and_then(|c| c.model_id.as_deref());
        let agent_name = incoming.agent_config.as_ref().and_then(|c| c.agent_name.as_deref());

        let mut session = Session::new(incoming.session_id.clone());
        session.token_count = incoming.token_count;
        session.context_window_size = incoming.context_window_size;
        if let Some(created_at) = incoming.created_at {
            session.created_at = created_at;
        }
        session.updated_at = incoming.updated_at.unwrap_or_else(|| session.created_at.clone());
        session.user_id = incoming.user_id;
        session.metadata = incoming.metadata;
        session.agent_config = incoming.agent_config;
        session.vendor = Vendor::detect_from_model_id(model_id);
        session.display_name = Session::resolve_display_name(incoming.session_name.as_deref(), agent_name);

        self.reset();

        let already_runtime = !incoming.messages.is_empty()
            && incoming.messages.iter().all(|m| m.get("timestamp").is_some());

        if already_runtime {
            session.messages = incoming
                .messages
                .into_iter()
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect();
            let session_id = session.session_id.clone();
            let messages = session.messages.clone();
            self.store.set_current_session(session);
            self.bus.publish(OutboundEvent::SessionMessagesLoaded { session_id, messages });
        } else {
            let outcome = resume::map_history(&incoming.messages);
            session.messages = outcome.messages.clone();
            let session_id = session.session_id.clone();
            self.store.set_current_session(session);

            for event in outcome.events {
                match event {
                    ResumeEvent::SubsessionStarted {
                        sub_session_type,
                        sub_agent_type,
                        prime_agent_key,
                        sub_agent_key,
                    } => self.bus.publish(OutboundEvent::SubsessionStarted {
                        sub_session_type,
                        sub_agent_type,
                        prime_agent_key,
                        sub_agent_key,
                    }),
                    ResumeEvent::SubsessionEnded => self.bus.publish(OutboundEvent::SubsessionEnded),
                    ResumeEvent::ToolCallComplete { call, result } => {
                        self.bus.publish(OutboundEvent::ToolCallComplete {
                            tool_calls: vec![call],
                            tool_results: vec![result],
                        })
                    }
                }
            }

            self.bus.publish(OutboundEvent::SessionMessagesLoaded {
                session_id,
                messages: outcome.messages,
            });
        }
    }

    fn handle_user_message(
        &mut self,
        session_id: &str,
        content: serde_json::Value,
        parent_session_id: Option<String>,
        event_user_session_id: Option<String>,
    ) {
        let normalized = content::normalize(ContentInput::from_value(&content));
        let mut message = Message::new(Role::User, normalized, MessageFormat::Text);

        let sub_session = self.detect_sub_session(session_id, parent_session_id, event_user_session_id);
        if let Some(marker) = sub_session.clone() {
            message.metadata_mut().sub_session = Some(marker);
            message.metadata_mut().is_sub_session = Some(true);
        }

        let vendor = self
            .store
            .get_current_session()
            .map(|s| s.vendor)
            .unwrap_or(Vendor::None);

        // A sub-session message belongs to a nested agent turn this crate
        // does not keep its own history for; it is still re-emitted for the
        // UI but never appended to the tracked current session.
        if sub_session.is_none() {
            if let Err(err) = self.store.append_message(session_id, message.clone()) {
                log::debug!("event stream processor: dropping user message, {err}");
                return;
            }
        }
        self.bus.publish(OutboundEvent::MessageAdded {
            session_id: session_id.to_string(),
            message: message.clone(),
        });
        self.bus.publish(OutboundEvent::UserMessage { vendor, message });
    }

    fn handle_cancelled(&mut self, session_id: &str) {
        if self.builder.has_current() {
            let mut meta = MessageMetadata {
                stop_reason: Some(StopReason::Cancelled),
                ..Default::default()
            };
            // Tool calls that completed before the cancellation still belong
            // on the truncated message; only ones left `executing` are lost.
            for pair in self.tools.drain_completed() {
                meta.push_tool_call_result(pair);
            }
            for pair in self.store.drain_pending_tools(session_id) {
                meta.push_tool_call_result(pair);
            }
            self.finalize_and_append(session_id, Some(meta));
        }
        self.reset();
        self.bus.publish(OutboundEvent::ResponseCancelled);
    }

    /// A message belongs to a sub-session when the event carries a
    /// `user_session_id` that differs from its own `session_id`, or when
    /// the processor's own tracked user session differs from the event's
    /// `session_id` (the sub-agent's turn is running under a different
    /// session id than the top-level conversation).
    fn detect_sub_session(
        &self,
        session_id: &str,
        parent_session_id: Option<String>,
        event_user_session_id: Option<String>,
    ) -> Option<SubSessionMarker> {
        let differs_from_event = event_user_session_id
            .as_deref()
            .is_some_and(|uid| uid != session_id);
        let differs_from_tracked = self
            .user_session_id
            .as_deref()
            .is_some_and(|uid| uid != session_id);

        if !differs_from_event && !differs_from_tracked {
            return None;
        }

        Some(SubSessionMarker {
            session_id: session_id.to_string(),
            parent_session_id: parent_session_id.or_else(|| self.user_session_id.clone()),
            user_session_id: event_user_session_id.or_else(|| self.user_session_id.clone()),
        })
    }
}

impl Default for EventStreamProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Zip `tool_calls` with their results by `tool_use_id`/`id`. A call with no
/// matching result is dropped rather than emitted half-formed.
fn pair_calls_with_results(tool_calls: Vec<ToolCall>, tool_results: Vec<ToolResult>) -> Vec<ToolCallWithResult> {
    tool_calls
        .into_iter()
        .filter_map(|call| {
            let result = tool_results.iter().find(|r| r.tool_use_id == call.id)?.clone();
            Some(ToolCallWithResult { call, result })
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::model::AgentConfig;
    use std::sync::{Arc, Mutex};

    pub(crate) fn recorder(processor: &EventStreamProcessor) -> Arc<Mutex<Vec<OutboundEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        processor
            .event_bus()
            .subscribe(Arc::new(move |event: &OutboundEvent| {
                sink.lock().unwrap().push(event.clone());
            }));
        events
    }

    pub(crate) fn labels(events: &[OutboundEvent]) -> Vec<&'static str> {
        events
            .iter()
            .map(|e| match e {
                OutboundEvent::MessageStreaming { .. } => "message-streaming",
                OutboundEvent::MessageComplete { .. } => "message-complete",
                OutboundEvent::MessageAdded { .. } => "message-added",
                OutboundEvent::MessageUpdated { .. } => "message-updated",
                OutboundEvent::SessionMessagesLoaded { .. } => "session-messages-loaded",
                OutboundEvent::ToolNotification { .. } => "tool-notification",
                OutboundEvent::ToolNotificationRemoved { .. } => "tool-notification-removed",
                OutboundEvent::ToolCallComplete { .. } => "tool-call-complete",
                OutboundEvent::MediaAdded { .. } => "media-added",
                OutboundEvent::SystemMessage { .. } => "system-message",
                OutboundEvent::Error { .. } => "error",
                OutboundEvent::SubsessionStarted { .. } => "subsession-started",
                OutboundEvent::SubsessionEnded => "subsession-ended",
                OutboundEvent::ResponseCancelled => "response-cancelled",
                OutboundEvent::UserMessage { .. } => "user-message",
                OutboundEvent::SessionsUpdated { .. } => "sessions-updated",
            })
            .collect()
    }

    pub(crate) fn start_session(processor: &mut EventStreamProcessor, session_id: &str) {
        processor.process_event(ServerEvent::ChatSessionChanged {
            session: IncomingSession {
                session_id: session_id.to_string(),
                token_count: 0,
                context_window_size: None,
                session_name: Some("Test chat".to_string()),
                created_at: None,
                updated_at: None,
                user_id: None,
                metadata: None,
                agent_config: Some(AgentConfig {
                    model_id: Some("claude-3-5-sonnet".into()),
                    agent_name: Some("Ada".into()),
                }),
                messages: Vec::new(),
            },
            user_session_id: Some(session_id.to_string()),
        });
    }
}


/// The boundary scenarios of spec.md §8, one test per scenario.
#[cfg(test)]
mod processor_scenarios;
