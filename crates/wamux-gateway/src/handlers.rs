// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.
//!
//! Every tenant-scoped handler validates the path phone number and checks it
//! against the caller's [`Principal`] before touching the manager or store.

use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use wamux_core::types::is_valid_phone;
use wamux_core::{
    ChatMetadata, Contact, HealthStatus, Message, SessionRecord, SessionStatus, WamuxError,
};
use wamux_session::SessionInfo;

use crate::auth::Principal;
use crate::error::ApiError;
use crate::server::GatewayState;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Request body for POST /sessions/create.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub phone_number: String,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub phone_number: String,
    /// Bound device id, or `"pending"` before pairing.
    pub session_id: String,
    pub status: SessionStatus,
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionRecord>,
}

#[derive(Debug, Serialize)]
pub struct QrResponse {
    pub qr: String,
}

#[derive(Debug, Serialize)]
pub struct AuthStatusResponse {
    pub is_authenticated: bool,
    pub phone: String,
}

/// Request body for POST /sessions/{phone}/auth/pair-phone.
#[derive(Debug, Deserialize)]
pub struct PairPhoneRequest {
    /// Phone to pair; defaults to the tenant itself.
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub show_notification: bool,
}

#[derive(Debug, Serialize)]
pub struct PairCodeResponse {
    pub pair_code: String,
}

/// Optional `?limit=` for message listings. Kept as a string so bad values
/// fall back to the default instead of failing the request.
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    #[serde(default)]
    pub limit: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub struct ReadStatusRequest {
    pub message_id: String,
    pub read: bool,
}

#[derive(Debug, Serialize)]
pub struct ReadStatusResponse {
    pub message_id: String,
    pub read: bool,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}

/// Request body for POST /sessions/{phone}/chats/{chat_id}/read.
#[derive(Debug, Deserialize)]
pub struct MarkChatReadRequest {
    pub message_ids: Vec<String>,
    /// Author of the messages; required by the protocol for group chats.
    #[serde(default)]
    pub sender_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MarkChatReadResponse {
    pub marked: usize,
}

#[derive(Debug, Serialize)]
pub struct ChatsResponse {
    pub chats: Vec<ChatMetadata>,
}

#[derive(Debug, Serialize)]
pub struct ContactsResponse {
    pub contacts: Vec<Contact>,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Live sessions held by the manager.
    pub sessions: usize,
}

fn check_phone(phone: &str) -> Result<(), WamuxError> {
    if is_valid_phone(phone) {
        Ok(())
    } else {
        Err(WamuxError::InvalidInput(format!(
            "'{phone}' is not an E.164 phone number"
        )))
    }
}

/// Validate the path phone and make sure the caller may act for it.
fn scope(principal: &Principal, phone: &str) -> Result<(), ApiError> {
    check_phone(phone)?;
    principal.authorize(phone)?;
    Ok(())
}

/// GET /health
///
/// Unauthenticated. Pings the store and reports uptime and session count.
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    let store = state.manager.store();
    let (code, status) = match store.health_check().await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "ok"),
        Ok(HealthStatus::Degraded(reason)) => {
            tracing::warn!(reason = %reason, "store degraded");
            (StatusCode::OK, "degraded")
        }
        Ok(HealthStatus::Unhealthy(reason)) => {
            tracing::warn!(reason = %reason, "store unhealthy");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
        Err(e) => {
            tracing::warn!(error = %e, "store health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    };

    let body = HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        sessions: state.manager.active_count().await,
    };
    (code, Json(body)).into_response()
}

/// POST /sessions/create
pub async fn create_session(
    State(state): State<GatewayState>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> ApiResult<CreateSessionResponse> {
    principal.require_admin()?;
    let Json(body) = body?;
    check_phone(&body.phone_number)?;

    let session = state.manager.create_session(&body.phone_number).await?;
    let info = session.info().await;
    Ok(Json(CreateSessionResponse {
        phone_number: info.phone_number,
        session_id: info.device_id.unwrap_or_else(|| "pending".to_string()),
        status: info.status,
    }))
}

/// GET /sessions/list
pub async fn list_sessions(
    State(state): State<GatewayState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<SessionListResponse> {
    principal.require_admin()?;
    let sessions = state.manager.list_sessions().await?;
    Ok(Json(SessionListResponse { sessions }))
}

/// GET /sessions/{phone}/status
pub async fn get_status(
    State(state): State<GatewayState>,
    Extension(principal): Extension<Principal>,
    Path(phone): Path<String>,
) -> ApiResult<SessionInfo> {
    scope(&principal, &phone)?;
    Ok(Json(state.manager.session_info(&phone).await?))
}

/// POST /sessions/{phone}/connect
pub async fn connect_session(
    State(state): State<GatewayState>,
    Extension(principal): Extension<Principal>,
    Path(phone): Path<String>,
) -> ApiResult<SessionInfo> {
    scope(&principal, &phone)?;
    state.manager.connect_session(&phone).await?;
    Ok(Json(state.manager.session_info(&phone).await?))
}

/// POST /sessions/{phone}/disconnect
pub async fn disconnect_session(
    State(state): State<GatewayState>,
    Extension(principal): Extension<Principal>,
    Path(phone): Path<String>,
) -> ApiResult<SessionInfo> {
    scope(&principal, &phone)?;
    state.manager.disconnect_session(&phone).await?;
    Ok(Json(state.manager.session_info(&phone).await?))
}

/// DELETE /sessions/{phone}/delete
pub async fn delete_session(
    State(state): State<GatewayState>,
    Extension(principal): Extension<Principal>,
    Path(phone): Path<String>,
) -> Result<StatusCode, ApiError> {
    scope(&principal, &phone)?;
    state.manager.delete_session(&phone).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /sessions/{phone}/qr
///
/// Blocks until the first QR code arrives or the configured wait expires.
pub async fn get_qr(
    State(state): State<GatewayState>,
    Extension(principal): Extension<Principal>,
    Path(phone): Path<String>,
) -> ApiResult<QrResponse> {
    scope(&principal, &phone)?;
    let qr = state.manager.get_qr_code(&phone).await?;
    Ok(Json(QrResponse { qr }))
}

/// GET /sessions/{phone}/auth/status
pub async fn get_auth_status(
    State(state): State<GatewayState>,
    Extension(principal): Extension<Principal>,
    Path(phone): Path<String>,
) -> ApiResult<AuthStatusResponse> {
    scope(&principal, &phone)?;
    let status = state.manager.get_session_status(&phone).await?;
    Ok(Json(AuthStatusResponse {
        is_authenticated: status == SessionStatus::Authenticated,
        phone,
    }))
}

/// POST /sessions/{phone}/auth/pair-phone
pub async fn pair_phone(
    State(state): State<GatewayState>,
    Extension(principal): Extension<Principal>,
    Path(phone): Path<String>,
    body: Result<Json<PairPhoneRequest>, JsonRejection>,
) -> ApiResult<PairCodeResponse> {
    scope(&principal, &phone)?;
    let Json(body) = body?;

    let target = match body.phone_number.filter(|p| !p.is_empty()) {
        Some(target) => {
            check_phone(&target)?;
            target
        }
        None => phone.clone(),
    };

    let pair_code = state
        .manager
        .pair_phone(&phone, &target, body.show_notification)
        .await?;
    Ok(Json(PairCodeResponse { pair_code }))
}

/// GET /sessions/{phone}/messages?limit=
pub async fn get_messages(
    State(state): State<GatewayState>,
    Extension(principal): Extension<Principal>,
    Path(phone): Path<String>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<MessagesResponse> {
    scope(&principal, &phone)?;
    let limit = state.limits.resolve(query.limit.as_deref());
    let messages = state.manager.store().get_messages(&phone, limit).await?;
    Ok(Json(MessagesResponse { messages }))
}

/// GET /sessions/{phone}/messages/{chat_id}?limit=
pub async fn get_chat_messages(
    State(state): State<GatewayState>,
    Extension(principal): Extension<Principal>,
    Path((phone, chat_id)): Path<(String, String)>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<MessagesResponse> {
    scope(&principal, &phone)?;
    let limit = state.limits.resolve(query.limit.as_deref());
    let messages = state
        .manager
        .store()
        .get_chat_messages(&phone, &chat_id, limit)
        .await?;
    Ok(Json(MessagesResponse { messages }))
}

/// POST /sessions/{phone}/messages/read-status
pub async fn update_read_status(
    State(state): State<GatewayState>,
    Extension(principal): Extension<Principal>,
    Path(phone): Path<String>,
    body: Result<Json<ReadStatusRequest>, JsonRejection>,
) -> ApiResult<ReadStatusResponse> {
    scope(&principal, &phone)?;
    let Json(body) = body?;

    let updated = state
        .manager
        .store()
        .update_message_read_status(&phone, &body.message_id, body.read)
        .await?;
    if !updated {
        return Err(WamuxError::NotFound {
            kind: "message",
            id: body.message_id,
        }
        .into());
    }
    Ok(Json(ReadStatusResponse {
        message_id: body.message_id,
        read: body.read,
    }))
}

/// GET /sessions/{phone}/messages/unread-count
pub async fn get_unread_count(
    State(state): State<GatewayState>,
    Extension(principal): Extension<Principal>,
    Path(phone): Path<String>,
) -> ApiResult<UnreadCountResponse> {
    scope(&principal, &phone)?;
    let unread_count = state.manager.store().get_unread_message_count(&phone).await?;
    Ok(Json(UnreadCountResponse { unread_count }))
}

/// GET /sessions/{phone}/chats
pub async fn get_chats(
    State(state): State<GatewayState>,
    Extension(principal): Extension<Principal>,
    Path(phone): Path<String>,
) -> ApiResult<ChatsResponse> {
    scope(&principal, &phone)?;
    let chats = state.manager.store().get_chats(&phone).await?;
    Ok(Json(ChatsResponse { chats }))
}

/// GET /sessions/{phone}/chats/{chat_id}
pub async fn get_chat(
    State(state): State<GatewayState>,
    Extension(principal): Extension<Principal>,
    Path((phone, chat_id)): Path<(String, String)>,
) -> ApiResult<ChatMetadata> {
    scope(&principal, &phone)?;
    match state
        .manager
        .store()
        .get_chat_metadata(&phone, &chat_id)
        .await?
    {
        Some(chat) => Ok(Json(chat)),
        None => Err(WamuxError::NotFound {
            kind: "chat",
            id: chat_id,
        }
        .into()),
    }
}

/// POST /sessions/{phone}/chats/{chat_id}/read
///
/// Sends read receipts (when connected) and flips the stored read flags.
pub async fn mark_chat_read(
    State(state): State<GatewayState>,
    Extension(principal): Extension<Principal>,
    Path((phone, chat_id)): Path<(String, String)>,
    body: Result<Json<MarkChatReadRequest>, JsonRejection>,
) -> ApiResult<MarkChatReadResponse> {
    scope(&principal, &phone)?;
    let Json(body) = body?;
    if body.message_ids.is_empty() {
        return Err(WamuxError::InvalidInput("message_ids must not be empty".into()).into());
    }

    let marked = state
        .manager
        .mark_read(&phone, &chat_id, body.sender_id.as_deref(), &body.message_ids)
        .await?;
    Ok(Json(MarkChatReadResponse { marked }))
}

/// GET /sessions/{phone}/contacts
pub async fn get_contacts(
    State(state): State<GatewayState>,
    Extension(principal): Extension<Principal>,
    Path(phone): Path<String>,
) -> ApiResult<ContactsResponse> {
    scope(&principal, &phone)?;
    let contacts = state.manager.store().get_contacts(&phone).await?;
    Ok(Json(ContactsResponse { contacts }))
}

/// GET /sessions/{phone}/contacts/{contact_id}
pub async fn get_contact(
    State(state): State<GatewayState>,
    Extension(principal): Extension<Principal>,
    Path((phone, contact_id)): Path<(String, String)>,
) -> ApiResult<Contact> {
    scope(&principal, &phone)?;
    match state
        .manager
        .store()
        .get_contact(&phone, &contact_id)
        .await?
    {
        Some(contact) => Ok(Json(contact)),
        None => Err(WamuxError::NotFound {
            kind: "contact",
            id: contact_id,
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_phone_request_defaults() {
        let req: PairPhoneRequest = serde_json::from_str("{}").unwrap();
        assert!(req.phone_number.is_none());
        assert!(!req.show_notification);
    }

    #[test]
    fn mark_chat_read_request_deserializes() {
        let req: MarkChatReadRequest =
            serde_json::from_str(r#"{"message_ids":["m1","m2"],"sender_id":"123@s.whatsapp.net"}"#)
                .unwrap();
        assert_eq!(req.message_ids, vec!["m1", "m2"]);
        assert_eq!(req.sender_id.as_deref(), Some("123@s.whatsapp.net"));
    }

    #[test]
    fn scope_rejects_malformed_phone_before_authorizing() {
        let err = scope(&Principal::Admin, "12345").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = scope(&Principal::Tenant("+15551230000".into()), "+15559990000").unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn health_response_serializes() {
        let resp = HealthResponse {
            status: "ok".to_string(),
            version: "0.1.0".to_string(),
            uptime_secs: 42,
            sessions: 3,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("\"uptime_secs\":42"));
        assert!(json.contains("\"sessions\":3"));
    }
}
