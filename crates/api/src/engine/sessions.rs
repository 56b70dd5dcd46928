//! Multi-turn editing sessions with a sliding TTL.

use chrono::Utc;
use dashmap::DashMap;
use genstudio_core::error::CoreError;
use genstudio_core::session::Session;
use genstudio_core::types::{ConversationHandle, SessionId, Timestamp};

pub struct SessionManager {
    sessions: DashMap<SessionId, Session>,
    ttl: chrono::Duration,
}

impl SessionManager {
    pub fn new(ttl: chrono::Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    /// Start a session around a provider conversation.
    pub fn open(&self, provider_handle: ConversationHandle) -> Session {
        self.open_at(provider_handle, Utc::now())
    }

    pub fn open_at(&self, provider_handle: ConversationHandle, now: Timestamp) -> Session {
        let session = Session::new(provider_handle, now, self.ttl);
        tracing::debug!(session_id = %session.id, "Session opened");
        self.sessions.insert(session.id, session.clone());
        session
    }

    /// Validate a session for another turn and slide its expiry forward.
    ///
    /// An expired session is dropped on the spot and reported as
    /// [`CoreError::SessionExpired`].
    pub fn touch(&self, id: SessionId) -> Result<Session, CoreError> {
        self.touch_at(id, Utc::now())
    }

    pub fn touch_at(&self, id: SessionId, now: Timestamp) -> Result<Session, CoreError> {
        {
            let mut entry = self
                .sessions
                .get_mut(&id)
                .ok_or_else(|| CoreError::not_found("Session", id))?;
            if !entry.is_expired(now) {
                entry.refresh(now, self.ttl);
                return Ok(entry.clone());
            }
        }

        self.sessions.remove_if(&id, |_, s| s.is_expired(now));
        tracing::info!(session_id = %id, "Edit rejected: session expired");
        Err(CoreError::SessionExpired(format!(
            "Session {id} has expired; start a new conversation"
        )))
    }

    /// Invalidate a session immediately, returning it if it existed.
    pub fn close(&self, id: SessionId) -> Option<Session> {
        self.sessions.remove(&id).map(|(_, session)| session)
    }

    /// Remove and return every session past its expiry.
    pub fn evict_expired(&self, now: Timestamp) -> Vec<Session> {
        let expired: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| *entry.key())
            .collect();

        expired
            .into_iter()
            .filter_map(|id| self.sessions.remove_if(&id, |_, s| s.is_expired(now)))
            .map(|(_, session)| session)
            .collect()
    }

    pub fn get(&self, id: SessionId) -> Option<Session> {
        self.sessions.get(&id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
