// tests/telegram_transport.rs
use analyst_report_digest::notify::telegram::TelegramTransport;
use analyst_report_digest::notify::{ChannelHandle, MessagingTransport, TransportError};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport(server: &MockServer) -> TelegramTransport {
    TelegramTransport::with_base(&server.uri(), "123:abc".into()).unwrap()
}

fn channel() -> ChannelHandle {
    ChannelHandle {
        chat_id: "-1001".into(),
        title: None,
    }
}

#[tokio::test]
async fn resolve_maps_get_chat() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/getChat"))
        .and(body_partial_json(json!({ "chat_id": "@reports" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": { "id": -1001, "type": "channel", "title": "Daily Reports" }
        })))
        .mount(&server)
        .await;

    let handle = transport(&server).resolve("@reports").await.unwrap();
    assert_eq!(handle.chat_id, "-1001");
    assert_eq!(handle.title.as_deref(), Some("Daily Reports"));
}

#[tokio::test]
async fn send_posts_markdown_without_preview() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .and(body_partial_json(json!({
            "chat_id": "-1001",
            "text": "📊 *hi*",
            "parse_mode": "Markdown",
            "disable_web_page_preview": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": { "message_id": 7 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    transport(&server).send(&channel(), "📊 *hi*").await.unwrap();
}

#[tokio::test]
async fn too_many_requests_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "ok": false,
            "error_code": 429,
            "description": "Too Many Requests: retry after 17",
            "parameters": { "retry_after": 17 }
        })))
        .mount(&server)
        .await;

    let err = transport(&server).send(&channel(), "x").await.unwrap_err();
    assert!(matches!(
        err,
        TransportError::RateLimited {
            retry_after_secs: 17
        }
    ));
}

#[tokio::test]
async fn bad_request_and_bad_token_are_classified_apart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: can't parse entities"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/getChat"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "ok": false,
            "error_code": 401,
            "description": "Unauthorized"
        })))
        .mount(&server)
        .await;

    let t = transport(&server);
    let send_err = t.send(&channel(), "x").await.unwrap_err();
    assert!(matches!(send_err, TransportError::Failed(ref m) if m.contains("can't parse entities")));

    let resolve_err = t.resolve("@reports").await.unwrap_err();
    assert!(matches!(resolve_err, TransportError::Unexpected(_)));
}
