//! Ambient configuration and logging bootstrap.
//!
//! The processor itself is deliberately unconfigurable — every rule in its
//! dispatch table is a fixed part of the external interface contract, not a
//! tunable. `ProcessorConfig` exists for host-level concerns instead: what
//! logging filter to install, and (reserved) future limits a host may want
//! on top of the processor's own bookkeeping.

/// Host-level settings for wiring a processor into an application. Currently
/// holds only the logging filter; reserved for future additions (e.g. a cap
/// on buffered pending tool calls per session) that the specification itself
/// does not mandate.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Passed to `env_logger`'s filter when [`ProcessorConfig::init_logging`]
    /// is used. Defaults to `info`, matching the crate's own `log::debug!`
    /// call sites being opt-in rather than on by default.
    pub log_filter: String,
}

impl ProcessorConfig {
    pub fn from_env() -> Self {
        Self {
            log_filter: std::env::var("TURNSTREAM_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }

    /// Install `env_logger` with this config's filter. Idempotent: a second
    /// call after the logger is already installed is a no-op.
    pub fn init_logging(&self) {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&self.log_filter)).try_init();
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self { log_filter: "info".to_string() }
    }
}
