// SPDX-FileCopyrightText: 2026 Wamux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the HTTP surface, driven through `tower::ServiceExt`.

use std::collections::BTreeMap;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use wamux_config::model::ServerConfig;
use wamux_core::{ClientEvent, ContactInfo, PairInfo, SessionStatus, SessionStore};
use wamux_gateway::{AuthConfig, GatewayState, build_router};
use wamux_test_utils::{TestHarness, text_message};

const ADMIN: &str = "admin-secret";
const TENANT_TOKEN: &str = "tok-a";
const PHONE_A: &str = "+15551230000";
const PHONE_B: &str = "+15559990000";

async fn test_app() -> (TestHarness, Router) {
    let harness = TestHarness::new().await.unwrap();
    let config = ServerConfig {
        bearer_token: Some(ADMIN.to_string()),
        tenant_tokens: BTreeMap::from([(TENANT_TOKEN.to_string(), PHONE_A.to_string())]),
        default_message_limit: 2,
        max_message_limit: 3,
        ..ServerConfig::default()
    };
    let state = GatewayState::new(harness.manager.clone(), &config);
    let app = build_router(state, AuthConfig::from_server_config(&config));
    (harness, app)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn create(app: &Router, phone: &str) {
    let (status, _) = send(
        app,
        Method::POST,
        "/sessions/create",
        Some(ADMIN),
        Some(json!({ "phone_number": phone })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

async fn wait_for_contacts(harness: &TestHarness, phone: &str, count: usize) {
    for _ in 0..200 {
        if harness.store.get_contacts(phone).await.unwrap().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("contacts for {phone} never reached {count}");
}

// ============================================================================
// Health and auth
// ============================================================================

#[tokio::test]
async fn health_is_public() {
    let (_harness, app) = test_app().await;

    let (status, body) = send(&app, Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sessions"], 0);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn missing_or_unknown_token_is_unauthorized() {
    let (_harness, app) = test_app().await;

    let (status, body) = send(&app, Method::GET, "/sessions/list", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = send(&app, Method::GET, "/sessions/list", Some("wrong"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tenant_token_is_scoped_to_its_phone() {
    let (_harness, app) = test_app().await;
    create(&app, PHONE_A).await;
    create(&app, PHONE_B).await;

    let own = format!("/sessions/{PHONE_A}/status");
    let (status, body) = send(&app, Method::GET, &own, Some(TENANT_TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phone_number"], PHONE_A);

    let other = format!("/sessions/{PHONE_B}/status");
    let (status, _) = send(&app, Method::GET, &other, Some(TENANT_TOKEN), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::GET, "/sessions/list", Some(TENANT_TOKEN), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        Method::POST,
        "/sessions/create",
        Some(TENANT_TOKEN),
        Some(json!({ "phone_number": PHONE_A })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ============================================================================
// Session lifecycle
// ============================================================================

#[tokio::test]
async fn create_and_list_sessions() {
    let (_harness, app) = test_app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/sessions/create",
        Some(ADMIN),
        Some(json!({ "phone_number": PHONE_A })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["session_id"], "pending");

    let (status, body) = send(&app, Method::GET, "/sessions/list", Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::OK);
    let sessions = body["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["phone_number"], PHONE_A);
}

#[tokio::test]
async fn create_rejects_bad_input() {
    let (_harness, app) = test_app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/sessions/create",
        Some(ADMIN),
        Some(json!({ "phone_number": "5551230000" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("E.164"));

    let (status, body) = send(
        &app,
        Method::POST,
        "/sessions/create",
        Some(ADMIN),
        Some(json!({ "phone": PHONE_A })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn malformed_path_phone_is_bad_request() {
    let (_harness, app) = test_app().await;

    let (status, _) = send(&app, Method::GET, "/sessions/not-a-phone/status", Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let (_harness, app) = test_app().await;

    let uri = format!("/sessions/{PHONE_A}/status");
    let (status, body) = send(&app, Method::GET, &uri, Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains(PHONE_A));
}

#[tokio::test]
async fn connect_disconnect_and_delete() {
    let (_harness, app) = test_app().await;
    create(&app, PHONE_A).await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/sessions/{PHONE_A}/connect"),
        Some(TENANT_TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_connected"], true);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/sessions/{PHONE_A}/disconnect"),
        Some(TENANT_TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "disconnected");
    assert_eq!(body["is_connected"], false);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/sessions/{PHONE_A}/delete"),
        Some(TENANT_TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/sessions/{PHONE_A}/status"),
        Some(TENANT_TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn connect_failure_is_bad_gateway() {
    let (harness, app) = test_app().await;
    create(&app, PHONE_A).await;
    harness
        .client(PHONE_A)
        .unwrap()
        .fail_next_connect("bridge unreachable");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/sessions/{PHONE_A}/connect"),
        Some(ADMIN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("bridge unreachable"));

    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/sessions/{PHONE_A}/status"),
        Some(ADMIN),
        None,
    )
    .await;
    assert_eq!(body["status"], "error");
    assert!(body["error"].as_str().unwrap().contains("bridge unreachable"));
}

// ============================================================================
// Pairing
// ============================================================================

#[tokio::test]
async fn qr_code_is_returned() {
    let (_harness, app) = test_app().await;
    create(&app, PHONE_A).await;

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/sessions/{PHONE_A}/qr"),
        Some(TENANT_TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["qr"], "2@mock-qr");

    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/sessions/{PHONE_A}/status"),
        Some(TENANT_TOKEN),
        None,
    )
    .await;
    assert_eq!(body["status"], "authenticating");
    assert_eq!(body["current_qr"], "2@mock-qr");
}

#[tokio::test]
async fn pair_phone_then_authenticated() {
    let (harness, app) = test_app().await;
    create(&app, PHONE_A).await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/sessions/{PHONE_A}/auth/pair-phone"),
        Some(TENANT_TOKEN),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pair_code"], "MOCK-CODE");

    harness
        .client(PHONE_A)
        .unwrap()
        .complete_pairing(PairInfo {
            device_id: "15551230000:1@s.whatsapp.net".into(),
            business_name: None,
            platform: Some("android".into()),
        })
        .await;
    harness
        .wait_for_status(PHONE_A, SessionStatus::Authenticated)
        .await
        .unwrap();

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/sessions/{PHONE_A}/auth/status"),
        Some(TENANT_TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_authenticated"], true);
    assert_eq!(body["phone"], PHONE_A);

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/sessions/{PHONE_A}/qr"),
        Some(TENANT_TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn pair_phone_rejects_malformed_target() {
    let (_harness, app) = test_app().await;
    create(&app, PHONE_A).await;

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/sessions/{PHONE_A}/auth/pair-phone"),
        Some(ADMIN),
        Some(json!({ "phone_number": "abc" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Messages, chats, contacts
// ============================================================================

async fn seed_messages(harness: &TestHarness) {
    for (id, text) in [("m1", "one"), ("m2", "two"), ("m3", "three")] {
        harness
            .inject(
                PHONE_A,
                ClientEvent::Message(text_message(id, "c1@s.whatsapp.net", text)),
            )
            .await
            .unwrap();
    }
    harness.wait_for_messages(PHONE_A, 3).await.unwrap();
}

#[tokio::test]
async fn message_limit_defaults_and_clamps() {
    let (harness, app) = test_app().await;
    create(&app, PHONE_A).await;
    seed_messages(&harness).await;

    let base = format!("/sessions/{PHONE_A}/messages");
    for (query, expected) in [("", 2), ("?limit=1", 1), ("?limit=abc", 2), ("?limit=100", 3)] {
        let (status, body) = send(
            &app,
            Method::GET,
            &format!("{base}{query}"),
            Some(TENANT_TOKEN),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["messages"].as_array().unwrap().len(),
            expected,
            "query {query:?}"
        );
    }

    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/sessions/{PHONE_A}/messages/c1@s.whatsapp.net?limit=10"),
        Some(TENANT_TOKEN),
        None,
    )
    .await;
    assert_eq!(body["messages"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn read_status_and_unread_count() {
    let (harness, app) = test_app().await;
    create(&app, PHONE_A).await;
    seed_messages(&harness).await;

    let unread = format!("/sessions/{PHONE_A}/messages/unread-count");
    let (_, body) = send(&app, Method::GET, &unread, Some(TENANT_TOKEN), None).await;
    assert_eq!(body["unread_count"], 3);

    let read_status = format!("/sessions/{PHONE_A}/messages/read-status");
    let (status, body) = send(
        &app,
        Method::POST,
        &read_status,
        Some(TENANT_TOKEN),
        Some(json!({ "message_id": "m1", "read": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["read"], true);

    let (_, body) = send(&app, Method::GET, &unread, Some(TENANT_TOKEN), None).await;
    assert_eq!(body["unread_count"], 2);

    let (status, _) = send(
        &app,
        Method::POST,
        &read_status,
        Some(TENANT_TOKEN),
        Some(json!({ "message_id": "missing", "read": true })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn mark_chat_read_sends_receipt_and_updates_chat() {
    let (harness, app) = test_app().await;
    create(&app, PHONE_A).await;
    seed_messages(&harness).await;
    harness.manager.connect_session(PHONE_A).await.unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/sessions/{PHONE_A}/chats/c1@s.whatsapp.net/read"),
        Some(TENANT_TOKEN),
        Some(json!({ "message_ids": ["m2", "m3"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["marked"], 2);

    let receipts = harness.client(PHONE_A).unwrap().read_receipts();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].message_ids, vec!["m2", "m3"]);

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/sessions/{PHONE_A}/chats/c1@s.whatsapp.net"),
        Some(TENANT_TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["unread_count"], 1);
    assert!(body["last_message_id"].is_string());

    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/sessions/{PHONE_A}/chats"),
        Some(TENANT_TOKEN),
        None,
    )
    .await;
    assert_eq!(body["chats"].as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/sessions/{PHONE_A}/chats/c1@s.whatsapp.net/read"),
        Some(TENANT_TOKEN),
        Some(json!({ "message_ids": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn contacts_are_listed_and_fetched() {
    let (harness, app) = test_app().await;
    create(&app, PHONE_A).await;
    harness
        .inject(
            PHONE_A,
            ClientEvent::ContactUpdate(ContactInfo {
                contact_id: "c1@s.whatsapp.net".into(),
                push_name: Some("Ada".into()),
                display_name: None,
                is_business: false,
            }),
        )
        .await
        .unwrap();
    wait_for_contacts(&harness, PHONE_A, 1).await;

    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/sessions/{PHONE_A}/contacts"),
        Some(TENANT_TOKEN),
        None,
    )
    .await;
    assert_eq!(body["contacts"].as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/sessions/{PHONE_A}/contacts/c1@s.whatsapp.net"),
        Some(TENANT_TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["push_name"], "Ada");

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/sessions/{PHONE_A}/contacts/nobody@s.whatsapp.net"),
        Some(TENANT_TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
