//! HTTP-level tests for the WebSocket gateway.
//!
//! Drives the `/ws` route through a real listener: a missing or
//! invalid token is refused with 401 before any upgrade happens, and a
//! valid token completes the handshake and serves the chat protocol.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::StatusCode;
use axum_test::TestServer;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;

use banter::{ChatServer, Config, Database, TokenClaims};

const SECRET: &str = "gateway-secret";

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

fn mint_token(sub: i64, username: &str) -> String {
    let claims = TokenClaims {
        sub,
        username: username.to_string(),
        iat: now(),
        exp: now() + 300,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

async fn test_server() -> (TestServer, Database) {
    let db = Database::open_in_memory().await.unwrap();
    let mut config = Config::default();
    config.auth.token_secret = SECRET.to_string();
    let chat_server = ChatServer::new(&config, &db).unwrap();

    // WebSocket upgrades need a real transport
    let server = TestServer::builder()
        .http_transport()
        .build(chat_server.router())
        .unwrap();
    (server, db)
}

#[tokio::test]
async fn missing_token_refused_with_401() {
    let (server, _db) = test_server().await;

    let response = server.get_websocket("/ws").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_token_refused_with_401() {
    let (server, _db) = test_server().await;

    let response = server
        .get_websocket("/ws")
        .add_query_param("token", "not-a-jwt")
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    // Signed with the wrong secret
    let forged = {
        let claims = TokenClaims {
            sub: 1,
            username: "mallory".to_string(),
            iat: now(),
            exp: now() + 300,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"other-secret"),
        )
        .unwrap()
    };
    let response = server
        .get_websocket("/ws")
        .add_query_param("token", forged)
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn valid_token_upgrades_and_serves_chat() {
    let (server, _db) = test_server().await;

    let response = server
        .get_websocket("/ws")
        .add_query_param("token", mint_token(1, "alice"))
        .await;
    response.assert_status(StatusCode::SWITCHING_PROTOCOLS);

    let mut websocket = response.into_websocket().await;
    websocket
        .send_text(r#"{"type": "join", "room": " Lobby "}"#)
        .await;

    // Backlog first, then the presence broadcasts
    let frame: Value = serde_json::from_str(&websocket.receive_text().await).unwrap();
    assert_eq!(frame["type"], "loadMessages");
    assert_eq!(frame["messages"], serde_json::json!([]));

    let frame: Value = serde_json::from_str(&websocket.receive_text().await).unwrap();
    assert_eq!(frame["type"], "userList");
    assert_eq!(frame["users"], serde_json::json!(["alice"]));

    let frame: Value = serde_json::from_str(&websocket.receive_text().await).unwrap();
    assert_eq!(frame["type"], "chatMessage");
    assert_eq!(frame["user"], "System");
    assert_eq!(frame["text"], "alice has joined lobby.");
}
