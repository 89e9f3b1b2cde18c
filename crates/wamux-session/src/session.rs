// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One tenant's runtime session: a protocol client plus mutable status.
//!
//! The status fields live behind a per-session [`RwLock`]. Commands to the
//! protocol client (connect, disconnect, pair) are issued while holding the
//! write half, which serializes them per tenant without touching any other
//! tenant's lock.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use wamux_core::types::format_timestamp;
use wamux_core::{ProtocolClient, SessionStatus, SessionStore, SessionUpdate, WamuxError};

/// Mutable, lock-guarded part of a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionState {
    pub status: SessionStatus,
    pub last_seen: DateTime<Utc>,
    /// Latest pairing QR; only meaningful while pairing.
    pub current_qr: Option<String>,
    /// Set only in [`SessionStatus::Error`].
    pub last_error: Option<String>,
}

impl SessionState {
    fn new(status: SessionStatus) -> Self {
        Self {
            status,
            last_seen: Utc::now(),
            current_qr: None,
            last_error: None,
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Utc::now();
    }
}

/// Serializable view of a session for the API layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub phone_number: String,
    pub status: SessionStatus,
    pub last_seen: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_qr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    pub is_connected: bool,
}

/// A requested status change plus the record fields that go with it.
#[derive(Debug, Clone)]
pub struct Transition {
    pub next: SessionStatus,
    pub update: SessionUpdate,
    pub error: Option<String>,
}

impl Transition {
    pub fn to(next: SessionStatus) -> Self {
        Self {
            next,
            update: SessionUpdate::status(next),
            error: None,
        }
    }

    /// Move to [`SessionStatus::Error`] recording `message`.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::to(SessionStatus::Error)
        }
    }

    /// Move to [`SessionStatus::Authenticated`] binding the given device.
    pub fn bound(
        device_id: &str,
        business_name: Option<String>,
        platform: Option<String>,
    ) -> Self {
        let next = SessionStatus::Authenticated;
        Self {
            next,
            update: SessionUpdate {
                auth_status: Some(next),
                session_id: Some(device_id.to_string()),
                device_id: Some(device_id.to_string()),
                business_name,
                platform,
            },
            error: None,
        }
    }
}

/// The runtime pairing of a protocol client and its status for one tenant.
pub struct Session {
    phone: String,
    generation: u64,
    client: Arc<dyn ProtocolClient>,
    state: RwLock<SessionState>,
    /// Stops this session's event dispatcher.
    events_cancel: CancellationToken,
}

impl Session {
    pub(crate) fn new(
        phone: &str,
        generation: u64,
        client: Arc<dyn ProtocolClient>,
        status: SessionStatus,
        events_cancel: CancellationToken,
    ) -> Self {
        Self {
            phone: phone.to_string(),
            generation,
            client,
            state: RwLock::new(SessionState::new(status)),
            events_cancel,
        }
    }

    /// The tenant phone number.
    pub fn phone(&self) -> &str {
        &self.phone
    }

    /// Distinguishes this session from earlier ones for the same tenant.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn client(&self) -> &Arc<dyn ProtocolClient> {
        &self.client
    }

    /// Whether a device identity is bound to this session's client.
    pub fn is_bound(&self) -> bool {
        self.client.device_id().is_some()
    }

    pub(crate) fn events_cancel(&self) -> &CancellationToken {
        &self.events_cancel
    }

    /// Shared access to the status fields.
    pub async fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().await
    }

    /// Exclusive access to the status fields; also the command lock.
    pub async fn lock(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().await
    }

    pub async fn status(&self) -> SessionStatus {
        self.state.read().await.status
    }

    pub async fn info(&self) -> SessionInfo {
        let state = self.state.read().await;
        SessionInfo {
            phone_number: self.phone.clone(),
            status: state.status,
            last_seen: format_timestamp(&state.last_seen),
            current_qr: state
                .status
                .accepts_pairing_artifact()
                .then(|| state.current_qr.clone())
                .flatten(),
            error: state.last_error.clone(),
            device_id: self.client.device_id(),
            is_connected: self.client.is_connected(),
        }
    }

    /// Apply `change` in memory and persist it.
    ///
    /// The caller must hold the write guard. Illegal transitions are logged
    /// and ignored (`Ok(false)`). The in-memory write happens first; a failed
    /// persist leaves the durable record stale and is returned to the caller.
    pub async fn transition(
        &self,
        state: &mut SessionState,
        store: &dyn SessionStore,
        change: Transition,
    ) -> Result<bool, WamuxError> {
        let prev = state.status;
        if !prev.can_transition_to(change.next) {
            warn!(
                tenant = %self.phone,
                from = %prev,
                to = %change.next,
                "rejected status transition"
            );
            return Ok(false);
        }

        state.status = change.next;
        state.touch();
        state.last_error = match change.next {
            SessionStatus::Error => change.error,
            _ => None,
        };
        if !change.next.accepts_pairing_artifact() {
            state.current_qr = None;
        }

        if prev != change.next {
            info!(tenant = %self.phone, from = %prev, to = %change.next, "session status changed");
        } else {
            debug!(tenant = %self.phone, status = %prev, "session status refreshed");
        }

        store.update_session(&self.phone, &change.update).await?;
        Ok(true)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("phone", &self.phone)
            .field("generation", &self.generation)
            .field("connected", &self.client.is_connected())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wamux_core::SessionRecord;
    use wamux_test_utils::{MemoryStore, MockClient};

    const PHONE: &str = "+15551230000";

    async fn setup(status: SessionStatus) -> (Session, MemoryStore) {
        let store = MemoryStore::new();
        store
            .create_session(&SessionRecord::pending(PHONE))
            .await
            .unwrap();
        let session = Session::new(
            PHONE,
            1,
            Arc::new(MockClient::new()),
            status,
            CancellationToken::new(),
        );
        (session, store)
    }

    #[tokio::test]
    async fn transition_updates_memory_and_store() {
        let (session, store) = setup(SessionStatus::Pending).await;
        let mut state = session.lock().await;
        let applied = session
            .transition(&mut state, &store, Transition::to(SessionStatus::Authenticating))
            .await
            .unwrap();
        assert!(applied);
        assert_eq!(state.status, SessionStatus::Authenticating);
        drop(state);

        let record = store.get_session(PHONE).await.unwrap().unwrap();
        assert_eq!(record.auth_status, SessionStatus::Authenticating);
    }

    #[tokio::test]
    async fn illegal_transition_is_ignored() {
        let (session, store) = setup(SessionStatus::Authenticated).await;
        let mut state = session.lock().await;
        let applied = session
            .transition(&mut state, &store, Transition::to(SessionStatus::Pending))
            .await
            .unwrap();
        assert!(!applied);
        assert_eq!(state.status, SessionStatus::Authenticated);
        drop(state);

        let record = store.get_session(PHONE).await.unwrap().unwrap();
        assert_eq!(record.auth_status, SessionStatus::Pending);
    }

    #[tokio::test]
    async fn error_message_is_cleared_on_leaving_error() {
        let (session, store) = setup(SessionStatus::Pending).await;
        let mut state = session.lock().await;
        session
            .transition(&mut state, &store, Transition::failed("boom"))
            .await
            .unwrap();
        assert_eq!(state.last_error.as_deref(), Some("boom"));

        session
            .transition(&mut state, &store, Transition::to(SessionStatus::Disconnected))
            .await
            .unwrap();
        assert!(state.last_error.is_none());
    }

    #[tokio::test]
    async fn qr_is_hidden_outside_pairing_states() {
        let (session, store) = setup(SessionStatus::Pending).await;
        {
            let mut state = session.lock().await;
            state.current_qr = Some("2@qr".into());
        }
        assert_eq!(session.info().await.current_qr.as_deref(), Some("2@qr"));

        let mut state = session.lock().await;
        session
            .transition(&mut state, &store, Transition::to(SessionStatus::Disconnected))
            .await
            .unwrap();
        assert!(state.current_qr.is_none());
    }
}
