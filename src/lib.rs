//! Realtime event-stream processor for agent-chat session state.
//!
//! Normalizes the inbound event stream from an agent-chat transport (text
//! and thought deltas, tool-call lifecycle, rendered media, resumed
//! history) into a single, vendor-agnostic [`model::Session`], and
//! publishes a matching outbound event for every mutation via a
//! synchronous, in-process [`event_bus::EventBus`].
//!
//! [`processor::EventStreamProcessor`] is the entry point: feed it
//! [`events::ServerEvent`]s, subscribe to its bus for the resulting
//! [`event_bus::OutboundEvent`]s.

pub mod config;
pub mod content;
pub mod contracts;
pub mod delegation_grammar;
pub mod error;
pub mod event_bus;
pub mod events;
pub mod message_builder;
pub mod model;
pub mod processor;
pub mod resume;
pub mod session_store;
pub mod tool_manager;

pub use error::ProcessorError;
pub use event_bus::{EventBus, EventSubscriber, OutboundEvent, SubscriberToken};
pub use events::ServerEvent;
pub use processor::EventStreamProcessor;
