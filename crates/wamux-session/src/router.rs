// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-tenant event dispatch from protocol clients into the store.
//!
//! Each session gets one dispatcher task draining its bounded event queue,
//! so events of one tenant are handled in emission order while tenants run
//! in parallel. The dispatcher knows only the tenant phone and the session
//! generation; every event re-resolves the session through the shared map
//! and is dropped if the session is gone or has been replaced.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use wamux_core::types::{format_timestamp, now_timestamp};
use wamux_core::{
    ClientEvent, Contact, ContactInfo, IncomingMessage, Message, PairInfo, Receipt,
    SessionStatus, SessionStore, WamuxError,
};

use crate::manager::SessionMap;
use crate::session::{Session, Transition};

/// Routes client events of every tenant to persistence and session status.
#[derive(Clone)]
pub struct EventRouter {
    sessions: SessionMap,
    store: Arc<dyn SessionStore>,
}

impl EventRouter {
    pub(crate) fn new(sessions: SessionMap, store: Arc<dyn SessionStore>) -> Self {
        Self { sessions, store }
    }

    /// Start the dispatcher task for one session.
    pub(crate) fn spawn(
        &self,
        phone: &str,
        generation: u64,
        rx: mpsc::Receiver<ClientEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let router = self.clone();
        let phone = phone.to_string();
        tokio::spawn(async move { router.run(phone, generation, rx, cancel).await })
    }

    /// Drain `rx` until it closes or `cancel` fires.
    pub async fn run(
        self,
        phone: String,
        generation: u64,
        mut rx: mpsc::Receiver<ClientEvent>,
        cancel: CancellationToken,
    ) {
        debug!(tenant = %phone, generation, "event dispatcher started");
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => self.handle(&phone, generation, event).await,
                    None => break,
                },
            }
        }
        debug!(tenant = %phone, generation, "event dispatcher stopped");
    }

    /// Handle a single event for `phone`.
    ///
    /// Persistence failures are logged and swallowed; one bad write must not
    /// stop the tenant's event stream.
    pub async fn handle(&self, phone: &str, generation: u64, event: ClientEvent) {
        let Some(session) = self.resolve(phone, generation).await else {
            debug!(tenant = %phone, kind = event.kind(), "dropping event for absent session");
            return;
        };
        let kind = event.kind();
        trace!(tenant = %phone, kind, "routing event");

        let result = match event {
            ClientEvent::Message(message) => self.on_message(&session, message).await,
            ClientEvent::Receipt(receipt) => self.on_receipt(&session, receipt).await,
            ClientEvent::Qr { codes } => {
                on_qr(&session, codes).await;
                Ok(())
            }
            ClientEvent::PairSuccess(info) => self.on_pair_success(&session, info).await,
            ClientEvent::PairError { error, .. } => {
                self.apply(&session, Transition::failed(error)).await
            }
            ClientEvent::ContactUpdate(info) => self.on_contact(&session, info).await,
            ClientEvent::Connected => self.on_connected(&session).await,
            ClientEvent::Disconnected => self.on_disconnected(&session).await,
        };

        if let Err(e) = result {
            error!(tenant = %phone, kind, error = %e, "failed to persist client event");
        }
    }

    async fn resolve(&self, phone: &str, generation: u64) -> Option<Arc<Session>> {
        self.sessions
            .read()
            .await
            .get(phone)
            .filter(|s| s.generation() == generation)
            .cloned()
    }

    async fn apply(&self, session: &Session, change: Transition) -> Result<(), WamuxError> {
        let mut state = session.lock().await;
        session
            .transition(&mut state, self.store.as_ref(), change)
            .await
            .map(|_| ())
    }

    async fn on_message(
        &self,
        session: &Session,
        incoming: IncomingMessage,
    ) -> Result<(), WamuxError> {
        let message = Message {
            content: incoming.payload.normalize(),
            phone_number: session.phone().to_string(),
            timestamp: format_timestamp(&incoming.timestamp),
            is_read: false,
            created_at: now_timestamp(),
            id: incoming.id,
            chat_id: incoming.chat_id,
            sender_id: incoming.sender_id,
            is_from_me: incoming.is_from_me,
            is_group: incoming.is_group,
        };

        self.store.save_message(&message).await?;
        self.store.record_chat_activity(&message).await?;
        session.lock().await.touch();
        Ok(())
    }

    async fn on_receipt(&self, session: &Session, receipt: Receipt) -> Result<(), WamuxError> {
        if !receipt.kind.is_read() {
            return Ok(());
        }
        let phone = session.phone();
        for id in &receipt.message_ids {
            // Unknown ids are expected (messages from before this store existed).
            if !self.store.update_message_read_status(phone, id, true).await? {
                trace!(tenant = %phone, message_id = %id, "receipt for unknown message");
            }
        }
        self.store
            .refresh_chat_unread_count(phone, &receipt.chat_id)
            .await?;
        Ok(())
    }

    async fn on_pair_success(&self, session: &Session, info: PairInfo) -> Result<(), WamuxError> {
        self.apply(
            session,
            Transition::bound(&info.device_id, info.business_name, info.platform),
        )
        .await
    }

    async fn on_contact(&self, session: &Session, info: ContactInfo) -> Result<(), WamuxError> {
        let now = now_timestamp();
        let contact = Contact {
            phone_number: session.phone().to_string(),
            contact_id: info.contact_id,
            display_name: info.display_name,
            push_name: info.push_name,
            is_business: info.is_business,
            created_at: now.clone(),
            updated_at: now,
        };
        self.store.save_contact(&contact).await
    }

    async fn on_connected(&self, session: &Session) -> Result<(), WamuxError> {
        // Checked under the session lock so a disconnect command cannot
        // land between the check and the status write.
        let mut state = session.lock().await;
        if !session.client().is_connected() {
            debug!(tenant = %session.phone(), "ignoring stale connected event");
            return Ok(());
        }
        match session.client().device_id() {
            Some(device_id) => session
                .transition(
                    &mut state,
                    self.store.as_ref(),
                    Transition::bound(&device_id, None, None),
                )
                .await
                .map(|_| ()),
            None => {
                state.touch();
                Ok(())
            }
        }
    }

    async fn on_disconnected(&self, session: &Session) -> Result<(), WamuxError> {
        let mut state = session.lock().await;
        if session.client().is_connected() {
            debug!(tenant = %session.phone(), "ignoring stale disconnected event");
            return Ok(());
        }
        session
            .transition(
                &mut state,
                self.store.as_ref(),
                Transition::to(SessionStatus::Disconnected),
            )
            .await
            .map(|_| ())
    }
}

async fn on_qr(session: &Session, codes: Vec<String>) {
    let Some(code) = codes.into_iter().next() else {
        return;
    };
    let mut state = session.lock().await;
    if state.status.accepts_pairing_artifact() {
        state.current_qr = Some(code);
        state.touch();
    } else {
        debug!(tenant = %session.phone(), status = %state.status, "ignoring QR outside pairing");
    }
}
