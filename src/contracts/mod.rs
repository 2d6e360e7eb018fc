//! Reference-only contracts for collaborating systems this crate does not
//! implement itself — the transport that feeds it [`crate::events::ServerEvent`]s
//! and the host's auth/session layer. Nothing here is wired into
//! [`crate::processor::EventStreamProcessor`]; it documents the shape a host
//! integration is expected to provide.

pub mod auth;
