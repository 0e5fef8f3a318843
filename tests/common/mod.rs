//! Common test utilities for deltastream-rs integration tests.
//!
//! Integration tests run against in-process servers: an `axum` router that
//! plays the REST API, and `tokio-tungstenite` listeners that play
//! dataplane streams. Every server binds `127.0.0.1:0`, so tests run in
//! parallel without configuration.
//!
//! ```bash
//! cargo test --test statement_tests
//! cargo test --test streaming_tests -- --nocapture
//! ```

#![allow(dead_code)]

use axum::Router;
use deltastream_rs::{Connection, ConnectionBuilder};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value as Json};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use uuid::Uuid;

/// Token every test server expects.
pub const TOKEN: &str = "sometoken";

/// Session id used by tests that need one.
pub const SESSION_ID: &str = "test-session";

/// Serve `app` on an ephemeral port and return its API base URL.
pub async fn spawn_api(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/v2", addr)
}

/// Accept one socket on an ephemeral port and hand it to `handler`.
///
/// Returns the `http` URI a dataplane redirect would carry.
pub async fn spawn_stream<F, Fut>(handler: F) -> String
where
    F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let socket = tokio_tungstenite::accept_async(stream).await.unwrap();
        handler(socket).await;
    });
    format!("http://{}/print", addr)
}

/// Connection to `server` with a short poll interval.
pub async fn connect(server: &str) -> Connection {
    connect_with(ConnectionBuilder::new().server(server)).await
}

/// Connection built from `builder` with the test token and a short poll
/// interval.
pub async fn connect_with(builder: ConnectionBuilder) -> Connection {
    let params = builder
        .token(TOKEN)
        .poll_interval(Duration::from_millis(10))
        .stream_handshake_timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    Connection::from_params(params).await.unwrap()
}

/// Check the bearer token of a request.
pub fn authorized(headers: &axum::http::HeaderMap) -> bool {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", TOKEN))
        .unwrap_or(false)
}

/// JSON body of a successful result set.
pub fn result_set(
    statement_id: Uuid,
    columns: &[(&str, &str)],
    partitions: &[i32],
    rows: Json,
) -> Json {
    json!({
        "statementID": statement_id,
        "sqlState": "00000",
        "createdOn": 1700000000,
        "metadata": {
            "encoding": "json",
            "partitionInfo": partitions
                .iter()
                .map(|count| json!({ "rowCount": count }))
                .collect::<Vec<_>>(),
            "columns": columns
                .iter()
                .map(|(name, type_name)| json!({ "name": name, "type": type_name, "nullable": true }))
                .collect::<Vec<_>>(),
        },
        "data": rows,
    })
}

/// JSON body of a `202 Accepted` response.
pub fn accepted(statement_id: Uuid) -> Json {
    json!({
        "statementID": statement_id,
        "sqlState": "03000",
        "createdOn": 1700000000,
    })
}

/// Read the `auth` message a client sends first.
pub async fn read_auth(socket: &mut WebSocketStream<TcpStream>) -> Json {
    match socket.next().await {
        Some(Ok(Message::Text(text))) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected auth message, got {:?}", other),
    }
}

/// Send one JSON frame.
pub async fn send_json(socket: &mut WebSocketStream<TcpStream>, frame: Json) {
    socket.send(Message::Text(frame.to_string())).await.unwrap();
}

/// Streaming metadata frame.
pub fn metadata_frame(columns: &[(&str, &str)]) -> Json {
    json!({
        "type": "metadata",
        "headers": {},
        "columns": columns
            .iter()
            .map(|(name, type_name)| json!({ "name": name, "type": type_name, "nullable": true }))
            .collect::<Vec<_>>(),
    })
}

/// Streaming data frame.
pub fn data_frame(cells: Json) -> Json {
    json!({ "type": "data", "headers": {}, "data": cells })
}
