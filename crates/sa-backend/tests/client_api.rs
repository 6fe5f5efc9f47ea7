//! Chat backend endpoint tests using wiremock.
//!
//! These tests verify that ChatClient hits the right paths, consumes the SSE
//! body into a sink, and reports HTTP failures with the server's detail.

use std::io::Write;

use sa_backend::mock::{self, fixtures, MockEvent};
use sa_backend::{ChatClient, ClientError};
use sa_protocol::{ChatRequest, ConversationMessage, StreamOutcome};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_request() -> ChatRequest {
    ChatRequest::new("what is in the handbook?", "user_test123", "session_1700000000000")
}

fn sse_response(body: Vec<u8>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

#[tokio::test]
async fn stream_chat_fills_message() {
    let server = MockServer::start().await;
    let body = fixtures::rag_answer(
        &["retrieve", "rerank", "synthesize"],
        &["The handbook", " covers onboarding."],
        json!({"retrieval_mode": "hybrid"}),
    )
    .frames
    .concat();

    Mock::given(method("POST"))
        .and(path("/chat/stream"))
        .and(body_json(json!({
            "message": "what is in the handbook?",
            "user_id": "user_test123",
            "session_id": "session_1700000000000"
        })))
        .respond_with(sse_response(body))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatClient::new(&server.uri()).unwrap();
    let mut message = ConversationMessage::pending_assistant();
    let outcome = client
        .stream_chat(&test_request(), &mut message, &CancellationToken::new())
        .await;
    message.finish(&outcome);

    assert_eq!(outcome, StreamOutcome::Completed);
    assert_eq!(message.text, "The handbook covers onboarding.");
    assert!(!message.pending);
    assert_eq!(
        message.rag_steps,
        vec![json!("retrieve"), json!("rerank"), json!("synthesize")]
    );
    assert_eq!(message.rag_trace, Some(json!({"retrieval_mode": "hybrid"})));
}

#[tokio::test]
async fn stream_chat_http_error_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/stream"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = ChatClient::new(&server.uri()).unwrap();
    let mut message = ConversationMessage::pending_assistant();
    let outcome = client
        .stream_chat(&test_request(), &mut message, &CancellationToken::new())
        .await;
    assert_eq!(outcome, StreamOutcome::Failed("HTTP 500".to_string()));

    message.finish(&outcome);
    assert_eq!(message.text, "Something went wrong: HTTP 500");
    assert!(!message.pending);
}

#[tokio::test]
async fn stream_chat_cancelled_before_connect() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/stream"))
        .respond_with(sse_response(mock::to_sse_bytes(&[MockEvent::Content(
            "unused".to_string(),
        )])))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let client = ChatClient::new(&server.uri()).unwrap();
    let mut message = ConversationMessage::pending_assistant();
    let outcome = client.stream_chat(&test_request(), &mut message, &cancel).await;
    assert_eq!(outcome, StreamOutcome::Cancelled);
    assert!(message.text.is_empty());
}

#[tokio::test]
async fn stream_chat_drops_malformed_payloads() {
    let server = MockServer::start().await;
    let body = mock::to_sse_bytes(&[
        MockEvent::Content("one".to_string()),
        MockEvent::Raw("not json at all".to_string()),
        MockEvent::Content(" two".to_string()),
        MockEvent::Done,
    ]);
    Mock::given(method("POST"))
        .and(path("/chat/stream"))
        .respond_with(sse_response(body))
        .mount(&server)
        .await;

    let client = ChatClient::new(&server.uri()).unwrap();
    let mut message = ConversationMessage::pending_assistant();
    let outcome = client
        .stream_chat(&test_request(), &mut message, &CancellationToken::new())
        .await;
    assert_eq!(outcome, StreamOutcome::Completed);
    assert_eq!(message.text, "one two");
}

#[tokio::test]
async fn chat_returns_whole_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "meow"})))
        .mount(&server)
        .await;

    let client = ChatClient::new(&server.uri()).unwrap();
    let answer = client.chat(&test_request()).await.unwrap();
    assert_eq!(answer, "meow");
}

#[tokio::test]
async fn chat_error_uses_json_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(
            ResponseTemplate::new(429).set_body_json(json!({"detail": "upstream rate limited"})),
        )
        .mount(&server)
        .await;

    let client = ChatClient::new(&server.uri()).unwrap();
    let err = client.chat(&test_request()).await.unwrap_err();
    match &err {
        ClientError::Api { status, detail } => {
            assert_eq!(*status, 429);
            assert_eq!(detail, "upstream rate limited");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
    assert_eq!(err.to_string(), "HTTP 429: upstream rate limited");
}

#[tokio::test]
async fn chat_error_falls_back_to_text_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let client = ChatClient::new(&server.uri()).unwrap();
    let err = client.chat(&test_request()).await.unwrap_err();
    assert_eq!(err.to_string(), "HTTP 502: Bad Gateway");
}

#[tokio::test]
async fn list_sessions_for_user() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sessions/user_test123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sessions": [
                {"session_id": "session_2", "updated_at": "2025-03-02T09:00:00", "message_count": 4},
                {"session_id": "session_1", "updated_at": "2025-03-01T09:00:00", "message_count": 2}
            ]
        })))
        .mount(&server)
        .await;

    let client = ChatClient::new(&server.uri()).unwrap();
    let sessions = client.list_sessions("user_test123").await.unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].session_id, "session_2");
    assert_eq!(sessions[0].message_count, 4);
}

#[tokio::test]
async fn session_messages_for_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sessions/user_test123/session_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [
                {"type": "human", "content": "hi", "timestamp": "t1"},
                {"type": "ai", "content": "hello", "timestamp": "t2"}
            ]
        })))
        .mount(&server)
        .await;

    let client = ChatClient::new(&server.uri()).unwrap();
    let messages = client
        .session_messages("user_test123", "session_1")
        .await
        .unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].message_type, "ai");
}

#[tokio::test]
async fn delete_session_tolerates_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/sessions/user_test123/session_1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatClient::new(&server.uri()).unwrap();
    let status = client
        .delete_session("user_test123", "session_1")
        .await
        .unwrap();
    assert!(status.message.is_empty());
}

#[tokio::test]
async fn delete_session_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/sessions/user_test123/missing"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"detail": "session not found"})),
        )
        .mount(&server)
        .await;

    let client = ChatClient::new(&server.uri()).unwrap();
    let err = client
        .delete_session("user_test123", "missing")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "HTTP 404: session not found");
}

#[tokio::test]
async fn list_documents() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [{"filename": "handbook.pdf", "file_type": "PDF", "chunk_count": 31}]
        })))
        .mount(&server)
        .await;

    let client = ChatClient::new(&server.uri()).unwrap();
    let documents = client.list_documents().await.unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].filename, "handbook.pdf");
    assert_eq!(documents[0].chunk_count, Some(31));
}

#[tokio::test]
async fn upload_document_posts_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/documents/upload"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "handbook.pdf uploaded"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("handbook.pdf");
    let mut file = std::fs::File::create(&file_path).unwrap();
    file.write_all(b"%PDF-1.4 test").unwrap();
    drop(file);

    let client = ChatClient::new(&server.uri()).unwrap();
    let status = client.upload_document(&file_path).await.unwrap();
    assert_eq!(status.message, "handbook.pdf uploaded");

    let requests = server.received_requests().await.unwrap();
    let content_type = requests[0]
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("multipart/form-data"));
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"file\""));
    assert!(body.contains("filename=\"handbook.pdf\""));
}

#[tokio::test]
async fn upload_missing_file_is_io_error() {
    let client = ChatClient::new("http://127.0.0.1:9").unwrap();
    let err = client
        .upload_document(std::path::Path::new("/definitely/not/here.pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Io(_)));
}

#[tokio::test]
async fn delete_document_encodes_filename() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/documents/annual%20report.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "deleted"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatClient::new(&server.uri()).unwrap();
    let status = client.delete_document("annual report.pdf").await.unwrap();
    assert_eq!(status.message, "deleted");
}
