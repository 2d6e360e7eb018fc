//! Message Builder: owns the single in-flight assistant (or thought) message
//! during streaming.
//!
//! A builder instance is exclusive to one interaction turn. Text and thought
//! deltas cannot coexist — switching kinds is the caller's job (see
//! [`crate::processor`]), which must `finalize` the old message before
//! `start`ing the new one.

use crate::model::{Message, MessageContent, MessageFormat, MessageMetadata, MessageStatus, Role};

/// Which of the two legal in-flight roles a builder currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentKind {
    Text,
    Thought,
}

impl CurrentKind {
    fn role(self) -> Role {
        match self {
            CurrentKind::Text => Role::Assistant,
            CurrentKind::Thought => Role::AssistantThought,
        }
    }

    fn format(self) -> MessageFormat {
        match self {
            CurrentKind::Text => MessageFormat::Text,
            CurrentKind::Thought => MessageFormat::Markdown,
        }
    }
}

struct InFlight {
    kind: CurrentKind,
    message: Message,
    text: String,
}

/// Accumulates a single streaming assistant message.
#[derive(Default)]
pub struct MessageBuilder {
    current: Option<InFlight>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self { current: None }
    }

    pub fn has_current(&self) -> bool {
        self.current.is_some()
    }

    pub fn current_type(&self) -> Option<CurrentKind> {
        self.current.as_ref().map(|c| c.kind)
    }

    /// A snapshot of the in-flight message as it would be emitted in a
    /// `message-streaming` event.
    pub fn current(&self) -> Option<&Message> {
        self.current.as_ref().map(|c| &c.message)
    }

    /// Allocate a fresh in-flight message. Discards any previous one without
    /// finalizing it — callers that need the prior message finalized and
    /// emitted must do so before calling `start` again.
    pub fn start(&mut self, kind: CurrentKind) {
        let mut message = Message::new(kind.role(), MessageContent::text(""), kind.format());
        message.status = Some(MessageStatus::Streaming);
        self.current = Some(InFlight {
            kind,
            message,
            text: String::new(),
        });
    }

    /// Append to the in-flight message's content. A no-op (logged) if there
    /// is no current message; the processor is responsible for calling
    /// `start` first.
    pub fn append_text(&mut self, delta: &str) {
        let Some(in_flight) = self.current.as_mut() else {
            log::debug!("message builder: append_text with no in-flight message, ignoring");
            return;
        };
        in_flight.text.push_str(delta);
        in_flight.message.content = MessageContent::text(in_flight.text.clone());
    }

    /// Stamp the in-flight message complete, attach `meta`, and return it,
    /// clearing the slot. Returns `None` if there is nothing in flight.
    pub fn finalize(&mut self, meta: Option<MessageMetadata>) -> Option<Message> {
        let in_flight = self.current.take()?;
        let mut message = in_flight.message;
        message.status = Some(MessageStatus::Complete);
        message.metadata = meta;
        Some(message)
    }

    /// Discard any in-flight message without finalizing it.
    pub fn reset(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StopReason;

    #[test]
    fn append_without_start_is_a_noop() {
        let mut builder = MessageBuilder::new();
        builder.append_text("hello");
        assert!(!builder.has_current());
    }

    #[test]
    fn start_then_append_accumulates_text() {
        let mut builder = MessageBuilder::new();
        builder.start(CurrentKind::Text);
        builder.append_text("The ");
        builder.append_text("quick");

        let current = builder.current().unwrap();
        assert_eq!(current.content, MessageContent::text("The quick"));
        assert_eq!(current.status, Some(MessageStatus::Streaming));
    }

    #[test]
    fn finalize_stamps_complete_and_clears_slot() {
        let mut builder = MessageBuilder::new();
        builder.start(CurrentKind::Text);
        builder.append_text("Done.");

        let mut meta = MessageMetadata::default();
        meta.stop_reason = Some(StopReason::Stop);
        let finalized = builder.finalize(Some(meta)).unwrap();

        assert_eq!(finalized.status, Some(MessageStatus::Complete));
        assert_eq!(finalized.content, MessageContent::text("Done."));
        assert!(!builder.has_current());
    }

    #[test]
    fn finalize_with_nothing_in_flight_returns_none() {
        let mut builder = MessageBuilder::new();
        assert!(builder.finalize(None).is_none());
    }

    #[test]
    fn reset_discards_without_finalizing() {
        let mut builder = MessageBuilder::new();
        builder.start(CurrentKind::Thought);
        builder.append_text("considering");
        builder.reset();

        assert!(!builder.has_current());
    }

    #[test]
    fn thought_kind_uses_markdown_format_and_thought_role() {
        let mut builder = MessageBuilder::new();
        builder.start(CurrentKind::Thought);
        let current = builder.current().unwrap();
        assert_eq!(current.role, Role::AssistantThought);
        assert_eq!(current.format, MessageFormat::Markdown);
    }
}
