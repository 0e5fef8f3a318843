//! Statement submission tests against an in-process REST server.

mod common;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use common::*;
use deltastream_rs::connection::ConnectionBuilder;
use deltastream_rs::query::{Attachment, RowCursor, StatementRequest};
use deltastream_rs::{ConnectionError, DeltaStreamError, ErrorKind, SqlState, Value};
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
struct ReceivedPart {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    body: Vec<u8>,
}

#[derive(Clone, Default)]
struct Recorder {
    parts: Arc<Mutex<Vec<ReceivedPart>>>,
}

async fn record_parts(
    State(recorder): State<Recorder>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if !authorized(&headers) {
        return (StatusCode::FORBIDDEN, Json(json!({ "message": "invalid token" }))).into_response();
    }
    while let Some(field) = multipart.next_field().await.unwrap() {
        let part = ReceivedPart {
            name: field.name().unwrap_or_default().to_string(),
            file_name: field.file_name().map(str::to_string),
            content_type: field.content_type().map(str::to_string),
            body: field.bytes().await.unwrap().to_vec(),
        };
        recorder.parts.lock().unwrap().push(part);
    }
    Json(result_set(Uuid::new_v4(), &[], &[], json!([]))).into_response()
}

#[tokio::test]
async fn test_attachments_are_sent_as_parts() {
    let recorder = Recorder::default();
    let app = Router::new()
        .route("/v2/statements", post(record_parts))
        .with_state(recorder.clone());
    let server = spawn_api(app).await;
    let connection = connect_with(ConnectionBuilder::new().server(&server).session_id(SESSION_ID)).await;

    let reader = std::io::Cursor::new(b"syntax = \"proto3\";".to_vec());
    let request = StatementRequest::new("CREATE DESCRIPTOR_SOURCE pb WITH ('file' = 'pb.desc');")
        .attachment(Attachment::from_bytes("pb.desc", b"\x0a\x0bdescriptor".to_vec()))
        .attachment(Attachment::from_reader("schema.proto", reader));
    connection
        .execute(&CancellationToken::new(), request)
        .await
        .unwrap();

    let parts = recorder.parts.lock().unwrap().clone();
    assert_eq!(parts.len(), 3);

    let request = &parts[0];
    assert_eq!(request.name, "request");
    assert_eq!(request.content_type.as_deref(), Some("application/json"));
    let body: JsonValue = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(
        body["statement"],
        "CREATE DESCRIPTOR_SOURCE pb WITH ('file' = 'pb.desc');"
    );
    assert_eq!(body["parameters"]["sessionID"], SESSION_ID);

    let mut files: Vec<_> = parts[1..]
        .iter()
        .map(|p| {
            assert_eq!(p.name, "attachments");
            (p.file_name.clone().unwrap(), p.body.clone())
        })
        .collect();
    files.sort();
    assert_eq!(
        files,
        vec![
            ("pb.desc".to_string(), b"\x0a\x0bdescriptor".to_vec()),
            ("schema.proto".to_string(), b"syntax = \"proto3\";".to_vec()),
        ]
    );
}

#[tokio::test]
async fn test_attachment_from_file() {
    let recorder = Recorder::default();
    let app = Router::new()
        .route("/v2/statements", post(record_parts))
        .with_state(recorder.clone());
    let server = spawn_api(app).await;
    let connection = connect(&server).await;

    let path = std::env::temp_dir().join(format!("deltastream-{}.desc", Uuid::new_v4()));
    tokio::fs::write(&path, b"file contents").await.unwrap();
    let attachment = Attachment::from_file("upload.desc", &path).await.unwrap();
    connection
        .execute(
            &CancellationToken::new(),
            StatementRequest::new("CREATE DESCRIPTOR_SOURCE f;").attachment(attachment),
        )
        .await
        .unwrap();
    tokio::fs::remove_file(&path).await.unwrap();

    let parts = recorder.parts.lock().unwrap().clone();
    assert_eq!(parts[1].file_name.as_deref(), Some("upload.desc"));
    assert_eq!(parts[1].body, b"file contents");
}

#[derive(Clone)]
struct Delayed {
    statement_id: Uuid,
    polls: Arc<AtomicUsize>,
    pending_polls: usize,
}

async fn submit_accepted(State(state): State<Delayed>) -> Response {
    (StatusCode::ACCEPTED, Json(accepted(state.statement_id))).into_response()
}

async fn poll_status(
    State(state): State<Delayed>,
    Path(statement_id): Path<Uuid>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    assert_eq!(statement_id, state.statement_id);
    assert_eq!(query.get("partitionID").map(String::as_str), Some("0"));
    assert_eq!(query.get("timezone").map(String::as_str), Some("UTC"));

    let poll = state.polls.fetch_add(1, Ordering::SeqCst) + 1;
    if poll < state.pending_polls {
        return (StatusCode::ACCEPTED, Json(accepted(state.statement_id))).into_response();
    }
    Json(result_set(
        state.statement_id,
        &[("name", "VARCHAR")],
        &[1],
        json!([["done"]]),
    ))
    .into_response()
}

fn delayed_app(state: Delayed) -> Router {
    Router::new()
        .route("/v2/statements", post(submit_accepted))
        .route("/v2/statements/:id", get(poll_status))
        .with_state(state)
}

#[tokio::test]
async fn test_delayed_result_polls_until_complete() {
    let state = Delayed {
        statement_id: Uuid::new_v4(),
        polls: Arc::new(AtomicUsize::new(0)),
        pending_polls: 3,
    };
    let server = spawn_api(delayed_app(state.clone())).await;
    let connection = connect(&server).await;

    let mut rows = connection
        .query(&CancellationToken::new(), "SELECT * FROM slow;")
        .await
        .unwrap();
    assert_eq!(state.polls.load(Ordering::SeqCst), 3);

    let row = rows.next_row().await.unwrap().unwrap();
    assert_eq!(row, vec![Value::String("done".to_string())]);
    assert!(rows.next_row().await.unwrap().is_none());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(state.polls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_cancel_while_polling() {
    let state = Delayed {
        statement_id: Uuid::new_v4(),
        polls: Arc::new(AtomicUsize::new(0)),
        pending_polls: usize::MAX,
    };
    let server = spawn_api(delayed_app(state.clone())).await;
    let connection = connect(&server).await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(60)).await;
        trigger.cancel();
    });

    let err = connection
        .execute(&cancel, "SELECT * FROM never;")
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(state.polls.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn test_sql_error() {
    let statement_id = Uuid::new_v4();
    let app = Router::new().route(
        "/v2/statements",
        post(move || async move {
            Json(json!({
                "statementID": statement_id,
                "sqlState": "42601",
                "message": "syntax error at or near \"SELEC\"",
                "metadata": {},
            }))
        }),
    );
    let server = spawn_api(app).await;
    let connection = connect(&server).await;

    let err = connection
        .query(&CancellationToken::new(), "SELEC 1;")
        .await
        .unwrap_err();
    let sql = err.as_sql().unwrap();
    assert_eq!(sql.code, SqlState::SyntaxError);
    assert_eq!(sql.message, "syntax error at or near \"SELEC\"");
    assert_eq!(sql.statement_id, Some(statement_id));
}

async fn failing_server(status: StatusCode) -> String {
    let app = Router::new().route(
        "/v2/statements",
        post(move || async move { (status, Json(json!({ "message": "boom" }))) }),
    );
    spawn_api(app).await
}

#[tokio::test]
async fn test_status_classification() {
    let cases = [
        (StatusCode::BAD_REQUEST, ErrorKind::Client, "boom"),
        (StatusCode::FORBIDDEN, ErrorKind::Authentication, "boom: error while authenticating with server"),
        (StatusCode::NOT_FOUND, ErrorKind::Client, "boom"),
        (StatusCode::REQUEST_TIMEOUT, ErrorKind::Deadline, "boom: deadline exceeded"),
        (StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::Server, "boom"),
        (StatusCode::SERVICE_UNAVAILABLE, ErrorKind::Unavailable, "boom: service temporarily unavailable"),
        (
            StatusCode::IM_A_TEAPOT,
            ErrorKind::Client,
            "unexpected response from server. status code: 418",
        ),
    ];

    for (status, kind, message) in cases {
        let connection = connect(&failing_server(status).await).await;
        let err = connection
            .execute(&CancellationToken::new(), "LIST STORES;")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), kind, "status {}", status);
        assert_eq!(err.to_string(), message, "status {}", status);
    }
}

#[derive(Clone, Default)]
struct ContextEcho {
    requests: Arc<Mutex<Vec<JsonValue>>>,
}

async fn echo_context(State(state): State<ContextEcho>, mut multipart: Multipart) -> Response {
    let field = multipart.next_field().await.unwrap().unwrap();
    let body: JsonValue = serde_json::from_slice(&field.bytes().await.unwrap()).unwrap();
    let first = {
        let mut requests = state.requests.lock().unwrap();
        requests.push(body);
        requests.len() == 1
    };

    let mut response = result_set(Uuid::new_v4(), &[], &[], json!([]));
    if first {
        response["metadata"]["context"] = json!({
            "organizationID": "6f1b1a7e-4a2f-4d4e-9a59-1b6c2f3d4e5f",
            "roleName": "sysadmin",
            "databaseName": "analytics",
            "schemaName": "public",
        });
    }
    Json(response).into_response()
}

#[tokio::test]
async fn test_context_carries_to_next_statement() {
    let state = ContextEcho::default();
    let app = Router::new()
        .route("/v2/statements", post(echo_context))
        .with_state(state.clone());
    let server = spawn_api(app).await;
    let connection = connect(&server).await;
    let cancel = CancellationToken::new();

    connection.execute(&cancel, "USE DATABASE analytics;").await.unwrap();
    connection.execute(&cancel, "LIST SCHEMAS;").await.unwrap();
    connection.execute(&cancel, "LIST STORES;").await.unwrap();

    let requests = state.requests.lock().unwrap().clone();
    assert!(requests[0].get("database").is_none());
    for request in &requests[1..] {
        assert_eq!(request["organization"], "6f1b1a7e-4a2f-4d4e-9a59-1b6c2f3d4e5f");
        assert_eq!(request["role"], "sysadmin");
        assert_eq!(request["database"], "analytics");
        assert_eq!(request["schema"], "public");
    }
    assert_eq!(
        connection.context().await.database_name.as_deref(),
        Some("analytics")
    );
}

#[tokio::test]
async fn test_ping_and_version() {
    let app = Router::new().route(
        "/v2/version",
        get(|headers: HeaderMap| async move {
            if authorized(&headers) {
                Json(json!({ "major": 2, "minor": 3, "patch": 4 })).into_response()
            } else {
                StatusCode::FORBIDDEN.into_response()
            }
        }),
    );
    let server = spawn_api(app).await;
    let connection = connect(&server).await;
    let cancel = CancellationToken::new();

    connection.ping(&cancel).await.unwrap();
    let version = connection.version(&cancel).await.unwrap();
    assert_eq!((version.major, version.minor, version.patch), (2, 3, 4));
}

#[tokio::test]
async fn test_ping_bad_connection() {
    let app = Router::new().route("/v2/version", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
    let server = spawn_api(app).await;
    let connection = connect(&server).await;

    let err = connection.ping(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(
        err,
        DeltaStreamError::Connection(ConnectionError::BadConnection(_))
    ));
}

#[tokio::test]
async fn test_data_types() {
    let app = Router::new().route(
        "/v2/statements",
        post(|| async {
            Json(result_set(
                Uuid::new_v4(),
                &[
                    ("v", "VARCHAR(20)"),
                    ("i", "INTEGER"),
                    ("b", "BIGINT"),
                    ("d", "DECIMAL(10,2)"),
                    ("day", "DATE"),
                    ("ts", "TIMESTAMP_TZ(9)"),
                    ("t", "TIME(3)"),
                    ("bin", "VARBINARY"),
                    ("ok", "BOOLEAN"),
                    ("arr", "ARRAY<INTEGER>"),
                    ("other", "GEOGRAPHY"),
                ],
                &[2],
                json!([
                    [
                        "text", "-12", "9007199254740993", "3.25", "2023-12-30",
                        "2023-12-30 03:37:45.123456789Z", "10:11:12.500", "aGVsbG8=",
                        "TRUE", "[1,2]", "POINT(1 2)"
                    ],
                    [null, null, null, null, null, null, null, null, null, null, null]
                ]),
            ))
        }),
    );
    let server = spawn_api(app).await;
    let connection = connect(&server).await;

    let mut rows = connection
        .query(&CancellationToken::new(), "SELECT * FROM types;")
        .await
        .unwrap();
    assert_eq!(rows.column_count(), 11);

    let row = rows.next_row().await.unwrap().unwrap();
    assert_eq!(row[0].as_str(), Some("text"));
    assert_eq!(row[1].as_i64(), Some(-12));
    assert_eq!(row[2].as_i64(), Some(9007199254740993));
    assert_eq!(row[3].as_f64(), Some(3.25));
    assert_eq!(
        row[4].as_date(),
        chrono::NaiveDate::from_ymd_opt(2023, 12, 30)
    );
    let ts = row[5].as_timestamp().unwrap();
    assert_eq!(ts.timestamp(), 1703907465);
    assert_eq!(ts.timestamp_subsec_nanos(), 123456789);
    assert_eq!(
        row[6].as_time(),
        chrono::NaiveTime::from_hms_milli_opt(10, 11, 12, 500)
    );
    assert_eq!(row[7].as_bytes(), Some(&b"hello"[..]));
    assert_eq!(row[8].as_bool(), Some(true));
    assert_eq!(row[9].as_str(), Some("[1,2]"));
    assert_eq!(row[10].as_str(), Some("POINT(1 2)"));

    let nulls = rows.next_row().await.unwrap().unwrap();
    assert!(nulls.iter().all(Value::is_null));
    assert!(rows.next_row().await.unwrap().is_none());
    rows.close().await.unwrap();
}
