//! Integration tests for the spool-lsp front-end.
//!
//! Each test runs a full framed session over an in-memory duplex stream
//! and drives it the way an editor would: handshake first, then requests,
//! notifications, cancellations, and finally exit or stream closure.

mod common;

use async_trait::async_trait;
use common::TestClient;
use serde_json::{Value, json};
use spool_core::error::{HandlerError, HandlerResult};
use spool_core::{HandlerRegistry, RequestHandler};
use spool_lsp::error::ConfigError;
use spool_lsp::server::{Server, ServerBuilder};
use spool_lsp::session::{ClientEnvironment, LogLevel, Session, VirtualFileStore};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

struct TestSession {
    environment: ClientEnvironment,
    root: Option<PathBuf>,
    files: Arc<VirtualFileStore>,
    config: Mutex<Option<Value>>,
    logs: Mutex<Vec<String>>,
    notes: Mutex<Vec<Value>>,
}

impl Session for TestSession {
    type Config = Value;

    fn log(&self, level: LogLevel, message: &str) {
        self.logs.lock().unwrap().push(format!("{level}: {message}"));
    }

    fn register_config(&self, config: Value) {
        *self.config.lock().unwrap() = Some(config);
    }
}

struct PanicHandler;

#[async_trait]
impl RequestHandler<TestSession> for PanicHandler {
    async fn handle(&self, _session: Arc<TestSession>, _params: Value) -> HandlerResult<Value> {
        panic!("handler exploded")
    }
}

fn test_server() -> (Server<TestSession>, mpsc::UnboundedReceiver<Arc<TestSession>>) {
    let (probe_tx, probe_rx) = mpsc::unbounded_channel();

    let mut registry = HandlerRegistry::new();
    registry.register_request("test/echo", |_session: Arc<TestSession>, params: Value| {
        async move { Ok(params) }
    });
    registry.register_request("test/sleep", |_session: Arc<TestSession>, params: Value| {
        async move {
            let ms = params["ms"].as_u64().unwrap_or(50);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(json!({"slept": ms}))
        }
    });
    registry.register_request("test/fail", |_session: Arc<TestSession>, _params: Value| {
        async move { Err(HandlerError::from("deliberate fault")) }
    });
    registry.register_request("test/panic", PanicHandler);
    registry.register_notification("test/record", |session: Arc<TestSession>, params: Value| {
        async move {
            session.notes.lock().unwrap().push(params);
            Ok(())
        }
    });
    registry.register_notification("test/badNote", |_session: Arc<TestSession>, _params: Value| {
        async move { Err(HandlerError::from("notification fault")) }
    });

    let mut plugin = HandlerRegistry::new();
    plugin.register_request("test/pluginInfo", |_session: Arc<TestSession>, _params: Value| {
        async move { Ok(json!("from plugin")) }
    });

    let server = ServerBuilder::new(
        json!({"telemetry": true}),
        |_prev: &Value, raw: &Value| {
            if raw.is_object() {
                Ok(raw.clone())
            } else {
                Err(ConfigError(format!("expected an object, got {raw}")))
            }
        },
        move |environment, files, root| {
            let session = Arc::new(TestSession {
                environment,
                root,
                files,
                config: Mutex::new(None),
                logs: Mutex::new(Vec::new()),
                notes: Mutex::new(Vec::new()),
            });
            let _ = probe_tx.send(Arc::clone(&session));
            Ok(session)
        },
    )
    .handlers(registry)
    .plugin_handlers(plugin)
    .initialize_result(json!({
        "capabilities": {"textDocumentSync": 1},
        "serverInfo": {"name": "spool-test", "version": "0.0.0"}
    }))
    .build();

    (server, probe_rx)
}

type ServerHandle = JoinHandle<spool_lsp::Result<()>>;

fn spawn_server() -> (
    TestClient,
    ServerHandle,
    mpsc::UnboundedReceiver<Arc<TestSession>>,
) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("off")),
        )
        .with_test_writer()
        .try_init();

    let (client_end, server_end) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server_end);
    let (server, probe) = test_server();
    let handle = tokio::spawn(server.run(server_read, server_write));
    (TestClient::new(client_end), handle, probe)
}

#[tokio::test]
async fn test_initialize_handshake() {
    let (mut client, _handle, mut probe) = spawn_server();

    let response = client.initialize().await;
    assert_eq!(response["id"], json!(0));
    assert_eq!(response["result"]["serverInfo"]["name"], json!("spool-test"));
    assert_eq!(
        response["result"]["capabilities"]["textDocumentSync"],
        json!(1)
    );

    let session = probe.recv().await.expect("session created during handshake");
    assert_eq!(session.environment.client_name.as_deref(), Some("test-editor"));
    assert_eq!(session.root, Some(PathBuf::from("/workspace")));
    assert!(session.files.is_empty(), "file store starts empty");
    assert_eq!(
        *session.config.lock().unwrap(),
        Some(json!({"telemetry": false})),
        "initializationOptions must be registered with the session exactly once"
    );
    assert!(
        session
            .logs
            .lock()
            .unwrap()
            .iter()
            .any(|line| line.contains("session established"))
    );
}

#[tokio::test]
async fn test_request_before_initialize_rejected() {
    let (mut client, _handle, _probe) = spawn_server();

    client.request(1, "test/echo", json!("early")).await;
    let response = client.recv().await.unwrap();
    assert_eq!(response["id"], json!(1));
    assert_eq!(response["error"]["code"], json!(-32002));

    // The handshake still succeeds afterwards
    let response = client.initialize().await;
    assert!(response.get("result").is_some());
}

#[tokio::test]
async fn test_second_initialize_rejected() {
    let (mut client, _handle, _probe) = spawn_server();
    client.initialize().await;

    client.request(9, "initialize", json!({})).await;
    let response = client.recv().await.unwrap();
    assert_eq!(response["id"], json!(9));
    assert_eq!(response["error"]["code"], json!(-32600));
}

// Scenario: a slow handler is cancelled shortly after dispatch; the client
// sees CANCELLED promptly instead of waiting out the handler.
#[tokio::test]
async fn test_cancel_beats_slow_handler() {
    let (mut client, _handle, _probe) = spawn_server();
    client.initialize().await;

    client.request(1, "test/sleep", json!({"ms": 5000})).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.cancel(1).await;

    let response = timeout(Duration::from_secs(2), client.recv())
        .await
        .expect("CANCELLED must arrive well before the handler finishes")
        .unwrap();
    assert_eq!(response["id"], json!(1));
    assert_eq!(response["error"]["code"], json!(-32800));
}

// Scenario: cancelling one request leaves an independent one untouched.
#[tokio::test]
async fn test_cancel_does_not_affect_other_requests() {
    let (mut client, _handle, _probe) = spawn_server();
    client.initialize().await;

    client.request(1, "test/sleep", json!({"ms": 3000})).await;
    client.request(2, "test/sleep", json!({"ms": 10})).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.cancel(1).await;

    let first = timeout(Duration::from_secs(2), client.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first["id"], json!(1));
    assert_eq!(first["error"]["code"], json!(-32800));

    let second = timeout(Duration::from_secs(2), client.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second["id"], json!(2));
    assert_eq!(second["result"]["slept"], json!(10));
}

// Scenario: a handler fault answers INTERNAL and later requests are fine.
#[tokio::test]
async fn test_fault_is_reported_and_contained() {
    let (mut client, _handle, _probe) = spawn_server();
    client.initialize().await;

    client.request(1, "test/fail", json!(null)).await;
    let response = client.recv().await.unwrap();
    assert_eq!(response["id"], json!(1));
    assert_eq!(response["error"]["code"], json!(-32603));
    assert_eq!(response["error"]["message"], json!("deliberate fault"));

    client.request(2, "test/panic", json!(null)).await;
    let response = client.recv().await.unwrap();
    assert_eq!(response["error"]["code"], json!(-32603));
    assert!(
        response["error"]["message"]
            .as_str()
            .unwrap()
            .contains("panicked")
    );

    client.request(3, "test/echo", json!("still up")).await;
    let response = client.recv().await.unwrap();
    assert_eq!(response["result"], json!("still up"));
}

// Scenario: exit terminates the server promptly even with work in flight;
// the pending request receives no response.
#[tokio::test]
async fn test_exit_with_pending_request() {
    let (mut client, handle, _probe) = spawn_server();
    client.initialize().await;

    client.request(1, "test/sleep", json!({"ms": 10000})).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.notify("exit", json!(null)).await;

    let run_result = timeout(Duration::from_secs(2), handle)
        .await
        .expect("exit must end the server promptly")
        .unwrap();
    assert!(run_result.is_ok());

    // Drain the wire: nothing for id 1, then EOF
    loop {
        match timeout(Duration::from_millis(500), client.recv()).await {
            Ok(Some(frame)) => assert_ne!(frame["id"], json!(1), "no response after exit"),
            Ok(None) => break,
            Err(_) => panic!("wire should close after exit"),
        }
    }
}

// Scenario: back-to-back cancels for one id; the duplicate is a no-op.
#[tokio::test]
async fn test_duplicate_cancel_is_noop() {
    let (mut client, _handle, _probe) = spawn_server();
    client.initialize().await;

    client.request(1, "test/sleep", json!({"ms": 5000})).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    client.cancel(1).await;
    client.cancel(1).await;

    let response = timeout(Duration::from_secs(2), client.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response["id"], json!(1));
    assert_eq!(response["error"]["code"], json!(-32800));

    client.request(2, "test/echo", json!("after")).await;
    let response = client.recv().await.unwrap();
    assert_eq!(response["id"], json!(2));

    // Exactly one response for id 1: the wire stays quiet now
    let extra = timeout(Duration::from_millis(200), client.recv()).await;
    assert!(extra.is_err(), "duplicate cancel must not produce a second response");
}

// A request cancelled while still queued behind other work resolves as
// CANCELLED without its handler ever running to completion.
#[tokio::test]
async fn test_cancel_of_queued_request() {
    let (mut client, _handle, _probe) = spawn_server();
    client.initialize().await;

    client.request(1, "test/sleep", json!({"ms": 300})).await;
    client.request(2, "test/sleep", json!({"ms": 5000})).await;
    client.cancel(2).await;

    let first = timeout(Duration::from_secs(2), client.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first["id"], json!(1));
    assert!(first.get("result").is_some());

    let second = timeout(Duration::from_secs(2), client.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second["id"], json!(2));
    assert_eq!(second["error"]["code"], json!(-32800));
}

#[tokio::test]
async fn test_unknown_method() {
    let (mut client, _handle, _probe) = spawn_server();
    client.initialize().await;

    client.request(1, "test/unknown", json!(null)).await;
    let response = client.recv().await.unwrap();
    assert_eq!(response["error"]["code"], json!(-32601));
    assert!(
        response["error"]["message"]
            .as_str()
            .unwrap()
            .contains("test/unknown")
    );
}

#[tokio::test]
async fn test_cancel_for_unknown_id_tolerated() {
    let (mut client, _handle, _probe) = spawn_server();
    client.initialize().await;

    client.cancel(99).await;
    client.request(1, "test/echo", json!("fine")).await;
    let response = client.recv().await.unwrap();
    assert_eq!(response["result"], json!("fine"));
}

#[tokio::test]
async fn test_notifications_run_in_order_with_faults_contained() {
    let (mut client, _handle, mut probe) = spawn_server();
    client.initialize().await;
    let session = probe.recv().await.unwrap();

    client.notify("test/record", json!(1)).await;
    client.notify("test/badNote", json!(null)).await;
    client.notify("test/record", json!(2)).await;
    client.notify("test/record", json!(3)).await;

    // A request behind the notifications proves the queue drained
    client.request(1, "test/echo", json!(null)).await;
    client.recv().await.unwrap();

    assert_eq!(*session.notes.lock().unwrap(), vec![json!(1), json!(2), json!(3)]);
}

#[tokio::test]
async fn test_plugin_handler_reachable() {
    let (mut client, _handle, _probe) = spawn_server();
    client.initialize().await;

    client.request(1, "test/pluginInfo", json!(null)).await;
    let response = client.recv().await.unwrap();
    assert_eq!(response["result"], json!("from plugin"));
}

#[tokio::test]
async fn test_exit_before_initialize_terminates() {
    let (mut client, handle, _probe) = spawn_server();
    client.notify("exit", json!(null)).await;

    let run_result = timeout(Duration::from_secs(2), handle)
        .await
        .expect("early exit must end the server")
        .unwrap();
    assert!(run_result.is_ok());
}

#[tokio::test]
async fn test_stream_closure_terminates() {
    let (mut client, handle, _probe) = spawn_server();
    client.initialize().await;
    drop(client);

    let run_result = timeout(Duration::from_secs(2), handle)
        .await
        .expect("stream closure must end the server")
        .unwrap();
    assert!(run_result.is_ok());
}

#[tokio::test]
async fn test_undecodable_body_answers_parse_error() {
    let (mut client, _handle, _probe) = spawn_server();
    client.initialize().await;

    client.send_raw(b"{ this is not json").await;
    let response = client.recv().await.unwrap();
    assert_eq!(response["id"], Value::Null);
    assert_eq!(response["error"]["code"], json!(-32700));

    // The session keeps working afterwards
    client.request(1, "test/echo", json!("ok")).await;
    let response = client.recv().await.unwrap();
    assert_eq!(response["result"], json!("ok"));
}
