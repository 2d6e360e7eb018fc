//! The auth collaborator's token contract, reference-only.
//!
//! A host wires its own OAuth/session layer in front of the transport that
//! feeds this crate's processor; this module exists only to name the shape
//! that layer is expected to expose (mirroring a bearer/refresh token pair
//! and the events a host might emit around it), so an integrator has a
//! concrete type to implement against rather than inventing one.

use serde::{Deserialize, Serialize};

/// A bearer token plus the refresh token and expiry needed to renew it
/// without reauthenticating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp the access token stops being valid at.
    pub expires_at: i64,
}

impl TokenPair {
    pub fn is_expired(&self, now_unix: i64) -> bool {
        now_unix >= self.expires_at
    }
}

/// Lifecycle events a host's auth layer may raise around a session's
/// credentials. Not dispatched by [`crate::processor::EventStreamProcessor`]
/// — a host observes these on its own auth collaborator and reacts by, for
/// example, tearing down and recreating its processor instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthEvent {
    Refreshed { tokens: TokenPair },
    Expired,
    Revoked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_pair_reports_expiry() {
        let tokens = TokenPair {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_at: 1000,
        };
        assert!(!tokens.is_expired(999));
        assert!(tokens.is_expired(1000));
    }
}
