// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The tenant-to-session registry and its lifecycle operations.
//!
//! Two lock levels:
//!
//! 1. The map lock guards insertions and removals and is only held for the
//!    map operation itself. Client construction runs outside it, behind a
//!    per-tenant creation slot, so two concurrent creates for one tenant
//!    build one client while other tenants stay fully available.
//! 2. Each [`Session`]'s own lock guards its status and serializes commands
//!    to its protocol client. Sessions never share a lock.
//!
//! The map lock is never held while a session lock is awaited.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tokio::sync::{Mutex, OnceCell, RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use wamux_config::SessionConfig;
use wamux_core::{
    ClientEvent, ClientFactory, ProtocolClient, QrEvent, SessionRecord, SessionStatus,
    SessionStore, SessionUpdate, WamuxError,
};

use crate::router::EventRouter;
use crate::session::{Session, SessionInfo, SessionState, Transition};

/// Shared tenant-to-session map.
pub(crate) type SessionMap = Arc<RwLock<HashMap<String, Arc<Session>>>>;

/// In-flight construction of one tenant's session.
type CreationSlot = Arc<OnceCell<Arc<Session>>>;

/// Source of per-session generation numbers, unique for the process.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Owns every live session and drives their protocol clients.
pub struct SessionManager {
    sessions: SessionMap,
    creating: Mutex<HashMap<String, CreationSlot>>,
    store: Arc<dyn SessionStore>,
    factory: Arc<dyn ClientFactory>,
    router: EventRouter,
    config: SessionConfig,
    shutdown: CancellationToken,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        factory: Arc<dyn ClientFactory>,
        config: SessionConfig,
    ) -> Self {
        let sessions: SessionMap = Arc::new(RwLock::new(HashMap::new()));
        let router = EventRouter::new(sessions.clone(), store.clone());
        Self {
            sessions,
            creating: Mutex::new(HashMap::new()),
            store,
            factory,
            router,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// The store sessions are persisted to.
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Number of sessions currently held in memory.
    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Return the tenant's session, creating it if needed.
    ///
    /// An existing in-memory session is returned unchanged. A tenant with a
    /// persisted record but no live session (after a restart without
    /// restore) is rebuilt from that record instead of duplicated.
    pub async fn create_session(&self, phone: &str) -> Result<Arc<Session>, WamuxError> {
        if self.shutdown.is_cancelled() {
            return Err(WamuxError::InvalidState(
                "session manager is shutting down".into(),
            ));
        }

        if let Some(existing) = self.sessions.read().await.get(phone) {
            debug!(tenant = %phone, "session already exists");
            return Ok(existing.clone());
        }
        self.ensure(phone, None).await
    }

    /// Look up a live session.
    pub async fn get_session(&self, phone: &str) -> Result<Arc<Session>, WamuxError> {
        self.sessions
            .read()
            .await
            .get(phone)
            .cloned()
            .ok_or_else(|| WamuxError::session_not_found(phone))
    }

    /// Open the tenant's transport. A no-op when already connected.
    pub async fn connect_session(&self, phone: &str) -> Result<(), WamuxError> {
        let session = self.get_session(phone).await?;
        let mut state = session.lock().await;
        self.connect_locked(&session, &mut state).await.map(|_| ())
    }

    /// Close the tenant's transport and record `Disconnected`.
    pub async fn disconnect_session(&self, phone: &str) -> Result<(), WamuxError> {
        let session = self.get_session(phone).await?;
        let mut state = session.lock().await;
        session.client().disconnect().await?;
        session
            .transition(
                &mut state,
                self.store.as_ref(),
                Transition::to(SessionStatus::Disconnected),
            )
            .await?;
        Ok(())
    }

    /// Wait for the first pairing QR code of an unbound session.
    ///
    /// Connects if needed and moves the session to `Authenticating`. The
    /// wait itself runs without the session lock and is bounded by
    /// `session.qr_timeout_secs`.
    pub async fn get_qr_code(&self, phone: &str) -> Result<String, WamuxError> {
        let session = self.get_session(phone).await?;
        if session.is_bound() {
            return Err(WamuxError::AlreadyAuthenticated);
        }

        let mut qr = {
            let mut state = session.lock().await;
            if session.is_bound() {
                return Err(WamuxError::AlreadyAuthenticated);
            }
            let qr = session.client().qr_channel().await?;
            self.connect_locked(&session, &mut state).await?;
            session
                .transition(
                    &mut state,
                    self.store.as_ref(),
                    Transition::to(SessionStatus::Authenticating),
                )
                .await?;
            qr
        };

        let timeout = self.config.qr_timeout();
        let code = match tokio::time::timeout(timeout, qr.recv()).await {
            Ok(Some(QrEvent::Code { code })) => code,
            Ok(Some(QrEvent::Success)) => return Err(WamuxError::AlreadyAuthenticated),
            Ok(Some(QrEvent::Error { message })) => return Err(WamuxError::transport(message)),
            Ok(Some(QrEvent::Timeout)) | Err(_) => {
                warn!(tenant = %phone, ?timeout, "no QR code before deadline");
                return Err(WamuxError::Timeout { duration: timeout });
            }
            Ok(None) => {
                return Err(WamuxError::transport(
                    "QR stream closed before a code arrived",
                ));
            }
        };

        let mut state = session.lock().await;
        if state.status.accepts_pairing_artifact() {
            state.current_qr = Some(code.clone());
            state.touch();
        }
        debug!(tenant = %phone, "QR code issued");
        Ok(code)
    }

    /// Request a phone pairing code for `target_phone`.
    pub async fn pair_phone(
        &self,
        phone: &str,
        target_phone: &str,
        show_push_notification: bool,
    ) -> Result<String, WamuxError> {
        let session = self.get_session(phone).await?;
        if session.is_bound() {
            return Err(WamuxError::AlreadyAuthenticated);
        }

        let mut state = session.lock().await;
        if session.is_bound() {
            return Err(WamuxError::AlreadyAuthenticated);
        }
        if self.connect_locked(&session, &mut state).await? {
            tokio::time::sleep(self.config.pair_settle_delay()).await;
        }
        session
            .transition(
                &mut state,
                self.store.as_ref(),
                Transition::to(SessionStatus::Authenticating),
            )
            .await?;

        match session
            .client()
            .pair_phone(target_phone, show_push_notification)
            .await
        {
            Ok(code) => {
                info!(tenant = %phone, "pairing code issued");
                Ok(code)
            }
            Err(e) => {
                warn!(tenant = %phone, error = %e, "pairing request failed");
                self.record_failure(&session, &mut state, &e).await;
                Err(e)
            }
        }
    }

    pub async fn get_session_status(&self, phone: &str) -> Result<SessionStatus, WamuxError> {
        Ok(self.get_session(phone).await?.status().await)
    }

    /// Snapshot of a live session for display.
    pub async fn session_info(&self, phone: &str) -> Result<SessionInfo, WamuxError> {
        Ok(self.get_session(phone).await?.info().await)
    }

    /// Every persisted session, newest first.
    pub async fn list_sessions(&self) -> Result<Vec<SessionRecord>, WamuxError> {
        self.store.list_sessions().await
    }

    /// Remove the tenant from memory and delete everything it owns.
    ///
    /// Works for tenants that only exist in the store. Fails with not-found
    /// when the tenant exists nowhere.
    pub async fn delete_session(&self, phone: &str) -> Result<(), WamuxError> {
        let removed = self.sessions.write().await.remove(phone);

        match removed {
            Some(session) => {
                session.events_cancel().cancel();
                let _state = session.lock().await;
                if let Err(e) = session.client().disconnect().await {
                    warn!(tenant = %phone, error = %e, "disconnect during delete failed");
                }
            }
            None => {
                if self.store.get_session(phone).await?.is_none() {
                    return Err(WamuxError::session_not_found(phone));
                }
            }
        }

        self.store.delete_session(phone).await?;
        info!(tenant = %phone, "session deleted");
        Ok(())
    }

    /// Send read receipts and flip the stored read flags.
    ///
    /// The receipt is only sent while connected; stored flags are updated
    /// either way. Returns how many stored messages matched.
    pub async fn mark_read(
        &self,
        phone: &str,
        chat_id: &str,
        sender_id: Option<&str>,
        message_ids: &[String],
    ) -> Result<usize, WamuxError> {
        let session = self.get_session(phone).await?;
        {
            let _state = session.lock().await;
            if session.client().is_connected() {
                session
                    .client()
                    .mark_read(message_ids, chat_id, sender_id, Utc::now())
                    .await?;
            } else {
                debug!(tenant = %phone, "not connected, skipping read receipt");
            }
        }

        let mut matched = 0;
        for id in message_ids {
            if self.store.update_message_read_status(phone, id, true).await? {
                matched += 1;
            }
        }
        self.store.refresh_chat_unread_count(phone, chat_id).await?;
        Ok(matched)
    }

    /// Rebuild live sessions from persisted records.
    ///
    /// Tenants with a bound device get a client for that identity and start
    /// `Disconnected`; the rest get a fresh identity and start `Pending`.
    /// With `auto_connect`, bound tenants are reconnected. A failing tenant
    /// is logged and skipped. Returns the number of sessions restored.
    pub async fn restore_sessions(&self) -> Result<usize, WamuxError> {
        let records = self.store.list_sessions().await?;
        let mut restored = 0;

        for record in records {
            let phone = record.phone_number.as_str();
            if self.sessions.read().await.contains_key(phone) {
                continue;
            }
            let session = match self.ensure(phone, Some(&record)).await {
                Ok(session) => session,
                Err(e) => {
                    error!(tenant = %phone, error = %e, "failed to restore session");
                    continue;
                }
            };
            restored += 1;

            if self.config.auto_connect
                && session.is_bound()
                && let Err(e) = self.connect_session(phone).await
            {
                warn!(tenant = %phone, error = %e, "reconnect of restored session failed");
            }
        }

        info!(count = restored, "sessions restored");
        Ok(restored)
    }

    /// Disconnect every client and close the store.
    ///
    /// New creates are refused from the moment this is called.
    pub async fn close(&self) -> Result<(), WamuxError> {
        self.shutdown.cancel();
        let drained: Vec<Arc<Session>> = self
            .sessions
            .write()
            .await
            .drain()
            .map(|(_, session)| session)
            .collect();

        info!(count = drained.len(), "closing sessions");
        for session in drained {
            let mut state = session.lock().await;
            if let Err(e) = session.client().disconnect().await {
                warn!(tenant = %session.phone(), error = %e, "disconnect on close failed");
                continue;
            }
            if let Err(e) = session
                .transition(
                    &mut state,
                    self.store.as_ref(),
                    Transition::to(SessionStatus::Disconnected),
                )
                .await
            {
                warn!(tenant = %session.phone(), error = %e, "failed to persist final status");
            }
        }

        self.store.close().await
    }

    /// Connect under an already held session lock.
    ///
    /// Returns whether a fresh connection was made. On failure the session
    /// moves to `Error` with the failure text.
    async fn connect_locked(
        &self,
        session: &Session,
        state: &mut SessionState,
    ) -> Result<bool, WamuxError> {
        if session.client().is_connected() {
            return Ok(false);
        }

        if let Err(e) = session.client().connect().await {
            warn!(tenant = %session.phone(), error = %e, "connect failed");
            self.record_failure(session, state, &e).await;
            return Err(e);
        }

        // A retry that got the transport back leaves Error; bound devices
        // are promoted by the connected event instead.
        if state.status == SessionStatus::Error && !session.is_bound() {
            session
                .transition(
                    state,
                    self.store.as_ref(),
                    Transition::to(SessionStatus::Pending),
                )
                .await?;
        }
        debug!(tenant = %session.phone(), "connected");
        Ok(true)
    }

    async fn record_failure(&self, session: &Session, state: &mut SessionState, err: &WamuxError) {
        if let Err(persist) = session
            .transition(state, self.store.as_ref(), Transition::failed(err.to_string()))
            .await
        {
            error!(tenant = %session.phone(), error = %persist, "failed to persist error status");
        }
    }

    /// Build the tenant's session at most once across concurrent callers.
    ///
    /// Callers for the same tenant share one [`CreationSlot`]; the first
    /// one runs the construction and the rest wait for its result. A failed
    /// construction leaves the slot empty for the next caller to retry.
    async fn ensure(
        &self,
        phone: &str,
        known: Option<&SessionRecord>,
    ) -> Result<Arc<Session>, WamuxError> {
        let slot = self
            .creating
            .lock()
            .await
            .entry(phone.to_string())
            .or_default()
            .clone();

        let result = slot
            .get_or_try_init(|| self.build(phone, known))
            .await
            .cloned();

        let mut creating = self.creating.lock().await;
        // Two holders left means the map entry and ours: nobody is waiting.
        if creating
            .get(phone)
            .is_some_and(|s| Arc::ptr_eq(s, &slot) && Arc::strong_count(s) == 2)
        {
            creating.remove(phone);
        }
        result
    }

    async fn build(
        &self,
        phone: &str,
        known: Option<&SessionRecord>,
    ) -> Result<Arc<Session>, WamuxError> {
        // A caller that lost the race to an earlier slot finds its result here.
        if let Some(existing) = self.sessions.read().await.get(phone) {
            return Ok(existing.clone());
        }

        let record = match known {
            Some(record) => Some(record.clone()),
            None => self.store.get_session(phone).await?,
        };
        match record {
            Some(record) => self.adopt(&record).await,
            None => self.create_fresh(phone).await,
        }
    }

    async fn create_fresh(&self, phone: &str) -> Result<Arc<Session>, WamuxError> {
        let client = self.factory.new_device(phone).await?;
        let (session, rx) = self.install(phone, client, SessionStatus::Pending).await?;
        if let Err(e) = self.store.create_session(&SessionRecord::pending(phone)).await {
            self.discard(&session).await;
            warn!(tenant = %phone, error = %e, "rolled back session after failed persist");
            return Err(e);
        }
        self.start_dispatcher(&session, rx);

        info!(tenant = %phone, "session created");
        Ok(session)
    }

    /// Rebuild a live session from its persisted record.
    async fn adopt(&self, record: &SessionRecord) -> Result<Arc<Session>, WamuxError> {
        let phone = record.phone_number.as_str();
        let (client, status) = match record.device_id.as_deref() {
            Some(device_id) => (
                self.factory.from_device(phone, device_id).await?,
                SessionStatus::Disconnected,
            ),
            None => (self.factory.new_device(phone).await?, SessionStatus::Pending),
        };

        let (session, rx) = self.install(phone, client, status).await?;
        if let Err(e) = self
            .store
            .update_session(phone, &SessionUpdate::status(status))
            .await
        {
            self.discard(&session).await;
            return Err(e);
        }
        self.start_dispatcher(&session, rx);

        info!(tenant = %phone, status = %status, "session loaded from store");
        Ok(session)
    }

    /// Wire a client's events to a new queue and insert the session.
    ///
    /// Refused once [`close`](Self::close) has started, so a construction
    /// racing shutdown cannot leave a session behind the drained map.
    async fn install(
        &self,
        phone: &str,
        client: Arc<dyn ProtocolClient>,
        status: SessionStatus,
    ) -> Result<(Arc<Session>, mpsc::Receiver<ClientEvent>), WamuxError> {
        let (tx, rx) = mpsc::channel(self.config.event_buffer);
        client.register_events(tx);

        let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        let session = Arc::new(Session::new(
            phone,
            generation,
            client,
            status,
            self.shutdown.child_token(),
        ));

        {
            let mut sessions = self.sessions.write().await;
            if !self.shutdown.is_cancelled() {
                sessions.insert(phone.to_string(), session.clone());
                return Ok((session, rx));
            }
        }
        self.discard(&session).await;
        Err(WamuxError::InvalidState(
            "session manager is shutting down".into(),
        ))
    }

    /// Undo [`install`](Self::install): drop the session from the map if it
    /// is still the live one, stop its events and disconnect its client.
    async fn discard(&self, session: &Arc<Session>) {
        {
            let mut sessions = self.sessions.write().await;
            if sessions
                .get(session.phone())
                .is_some_and(|live| Arc::ptr_eq(live, session))
            {
                sessions.remove(session.phone());
            }
        }
        session.events_cancel().cancel();
        if let Err(e) = session.client().disconnect().await {
            warn!(tenant = %session.phone(), error = %e, "disconnect of discarded session failed");
        }
    }

    fn start_dispatcher(&self, session: &Session, rx: mpsc::Receiver<ClientEvent>) {
        self.router.spawn(
            session.phone(),
            session.generation(),
            rx,
            session.events_cancel().clone(),
        );
    }
}
