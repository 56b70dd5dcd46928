//! Multi-turn image editing sessions.

use serde::Serialize;

use crate::types::{ConversationHandle, SessionId, Timestamp};

/// A provider conversation that edit turns can continue.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: SessionId,
    #[serde(skip_serializing)]
    pub provider_handle: ConversationHandle,
    pub created_at: Timestamp,
    pub last_used_at: Timestamp,
    pub expires_at: Timestamp,
}

impl Session {
    pub fn new(provider_handle: ConversationHandle, now: Timestamp, ttl: chrono::Duration) -> Self {
        Self {
            id: SessionId::new(),
            provider_handle,
            created_at: now,
            last_used_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.expires_at
    }

    /// Record a use at `now` and push the expiry out by `ttl`.
    pub fn refresh(&mut self, now: Timestamp, ttl: chrono::Duration) {
        self.last_used_at = now;
        self.expires_at = now + ttl;
    }
}
