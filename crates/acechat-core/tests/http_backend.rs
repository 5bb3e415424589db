use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use acechat_core::{
    ChatBackend, ChatRole, Error, HttpBackend, ResponseKind, Session, SessionEvent, Settings,
    SettingsStore,
};
use futures_util::StreamExt;
use mockito::{Matcher, Server};
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

fn backend(server: &Server) -> HttpBackend {
    HttpBackend::new(&server.url(), Some(Duration::from_secs(5))).unwrap()
}

async fn settle(session: &mut Session<HttpBackend>, rx: &mut UnboundedReceiver<SessionEvent>) {
    while !session.is_idle() {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for session event")
            .expect("session channel closed");
        session.handle(event);
    }
}

#[tokio::test]
async fn test_chat_posts_message_and_streams_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat")
        .match_body(Matcher::Json(json!({"message": "hi"})))
        .with_status(200)
        .with_header("content-type", "text/plain; charset=utf-8")
        .with_chunked_body(|w| {
            w.write_all(b"He")?;
            w.write_all(b"llo **wor")?;
            w.write_all(b"ld**")
        })
        .create_async()
        .await;

    let response = backend(&server).chat("hi").await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.kind, ResponseKind::Stream);

    let body: Vec<u8> = response
        .body
        .map(|chunk| chunk.unwrap().to_vec())
        .concat()
        .await;
    assert_eq!(body, b"Hello **world**");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_session_renders_streamed_reply() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/chat")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_chunked_body(|w| {
            w.write_all("caf\u{e9} ".as_bytes())?;
            w.write_all(b"**ok**")
        })
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let store = SettingsStore::new(dir.path().join("settings.json"));
    let (mut session, mut rx) = Session::new(Arc::new(backend(&server)), store);

    assert!(session.send("hello"));
    settle(&mut session, &mut rx).await;

    let reply = session.transcript().messages().last().unwrap();
    assert_eq!(reply.role, ChatRole::Assistant);
    assert_eq!(reply.markup(), "caf\u{e9} <strong>ok</strong>");
    assert!(!session.gate().is_busy());
}

#[tokio::test]
async fn test_session_reports_server_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/chat")
        .with_status(500)
        .with_header("content-type", "text/plain")
        .with_body("internal")
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let store = SettingsStore::new(dir.path().join("settings.json"));
    let (mut session, mut rx) = Session::new(Arc::new(backend(&server)), store);

    session.send("hello");
    settle(&mut session, &mut rx).await;

    let t = session.transcript();
    assert_eq!(t.count_role(ChatRole::Error), 1);
    assert_eq!(t.count_role(ChatRole::Assistant), 0);
    assert_eq!(
        t.messages().last().map(|m| m.content()),
        Some("Error: Server error: 500")
    );
    assert!(!session.gate().is_busy());
}

#[tokio::test]
async fn test_chat_json_reply_kind() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/chat")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"response": "hi"}"#)
        .create_async()
        .await;

    let response = backend(&server).chat("hi").await.unwrap();
    assert_eq!(response.kind, ResponseKind::Json);
}

#[tokio::test]
async fn test_new_chat_success_and_rejection() {
    let mut server = Server::new_async().await;
    let ok = server
        .mock("POST", "/new_chat")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status": "success"}"#)
        .expect(1)
        .create_async()
        .await;

    backend(&server).new_chat().await.unwrap();
    ok.assert_async().await;
    ok.remove_async().await;

    server
        .mock("POST", "/new_chat")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status": "busy"}"#)
        .create_async()
        .await;

    let err = backend(&server).new_chat().await.unwrap_err();
    assert!(matches!(err, Error::Rejected(_)));
}

#[tokio::test]
async fn test_settings_wire_format() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/settings")
        .match_body(Matcher::Json(
            json!({"model": "mistral", "temperature": 0.5, "num_predict": null}),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status": "success", "settings": {}}"#)
        .create_async()
        .await;

    let settings = Settings::from_form("mistral", "0.5", "");
    backend(&server).save_settings(&settings).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_settings_server_error_status() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/settings")
        .with_status(503)
        .with_body("unavailable")
        .create_async()
        .await;

    let err = backend(&server)
        .save_settings(&Settings::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Status(503)));
}

#[tokio::test]
async fn test_listen_text_and_error() {
    let mut server = Server::new_async().await;
    let heard = server
        .mock("GET", "/listen")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"text": "open the pod bay doors"}"#)
        .create_async()
        .await;

    let text = backend(&server).listen().await.unwrap();
    assert_eq!(text, "open the pod bay doors");
    heard.remove_async().await;

    server
        .mock("GET", "/listen")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error": "Could not understand audio"}"#)
        .create_async()
        .await;

    match backend(&server).listen().await {
        Err(Error::Rejected(message)) => assert_eq!(message, "Could not understand audio"),
        other => panic!("unexpected listen result: {other:?}"),
    }
}
