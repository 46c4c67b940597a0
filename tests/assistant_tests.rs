use inbox_assist::config::BackendConfig;
use inbox_assist::connectivity::{Connectivity, ConnectivityMonitor, HealthProbe};
use inbox_assist::{ApiClient, ChatSession, EmailAssistant, ErrorKind, IngestionStatus};
use std::time::Duration;

struct AlwaysHealthy;

impl HealthProbe for AlwaysHealthy {
    async fn probe(&self) -> bool {
        true
    }
}

fn assistant_for(base_url: String, online: bool) -> EmailAssistant<AlwaysHealthy> {
    let client = ApiClient::new(BackendConfig {
        base_url,
        request_timeout_secs: 5,
        max_attempts: 3,
        retry_base_delay_ms: 10,
    });
    let monitor = ConnectivityMonitor::new(AlwaysHealthy, online, Duration::from_secs(5));
    EmailAssistant::new(client, monitor)
}

#[tokio::test]
async fn test_requests_refused_while_offline() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/emails/search")
        .with_status(200)
        .with_body(r#"{"results": [], "count": 0}"#)
        .expect(0)
        .create_async()
        .await;

    let assistant = assistant_for(server.url(), false);
    let err = assistant.search_emails("invoice", 25).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::NetworkFailure);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_network_failure_forces_offline_until_healthy_poll() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let assistant = assistant_for(format!("http://127.0.0.1:{port}"), true);

    let err = assistant.email_status().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NetworkFailure);
    assert_eq!(assistant.monitor().state(), Connectivity::Offline);

    assistant.refresh_connectivity().await;
    assert!(assistant.is_online());
}

#[tokio::test]
async fn test_server_error_keeps_monitor_online() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/system/status")
        .with_status(500)
        .create_async()
        .await;

    let assistant = assistant_for(server.url(), true);
    let err = assistant.system_status().await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::ServerError);
    assert!(assistant.is_online());
}

#[tokio::test]
async fn test_chat_adopts_backend_session_id() {
    let mut server = mockito::Server::new_async().await;
    let first = server
        .mock("POST", "/api/chat/message")
        .match_body(mockito::Matcher::Json(serde_json::json!({"message": "hi"})))
        .with_status(200)
        .with_body(r#"{"response": "Hello!", "session_id": "session_1700000000000"}"#)
        .expect(1)
        .create_async()
        .await;
    let follow_up = server
        .mock("POST", "/api/chat/message")
        .match_body(mockito::Matcher::PartialJson(
            serde_json::json!({"session_id": "session_1700000000000"}),
        ))
        .with_status(200)
        .with_body(r#"{"response": "Still here.", "session_id": "session_1700000000000"}"#)
        .expect(1)
        .create_async()
        .await;

    let assistant = assistant_for(server.url(), true);
    let mut session = ChatSession::new();

    assistant.chat(&mut session, "hi").await.unwrap();
    assert_eq!(session.session_id(), Some("session_1700000000000"));

    let reply = assistant.chat(&mut session, "and now?").await.unwrap();
    assert_eq!(reply.response, "Still here.");

    first.assert_async().await;
    follow_up.assert_async().await;
}

#[tokio::test]
async fn test_wait_for_emails_ready() {
    let mut server = mockito::Server::new_async().await;
    let processing = server
        .mock("GET", "/api/emails/status")
        .with_status(200)
        .with_body(r#"{"status": "processing", "last_checked": null}"#)
        .expect(2)
        .create_async()
        .await;
    let ready = server
        .mock("GET", "/api/emails/status")
        .with_status(200)
        .with_body(r#"{"status": "ready", "last_checked": "2024-05-01T10:00:00.000001"}"#)
        .create_async()
        .await;

    let assistant = assistant_for(server.url(), true);
    let status = assistant
        .wait_for_emails_ready(Duration::from_millis(10), Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(status.status, IngestionStatus::Ready);
    assert!(status.last_checked_at().is_some());
    processing.assert_async().await;
    ready.assert_async().await;
}

#[tokio::test]
async fn test_wait_for_emails_gives_up() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/emails/status")
        .with_status(200)
        .with_body(r#"{"status": "processing"}"#)
        .create_async()
        .await;

    let assistant = assistant_for(server.url(), true);
    let err = assistant
        .wait_for_emails_ready(Duration::from_millis(20), Duration::from_millis(50))
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Timeout);
}

#[tokio::test]
async fn test_wait_for_emails_without_deadline() {
    let mut server = mockito::Server::new_async().await;
    let processing = server
        .mock("GET", "/api/emails/status")
        .with_status(200)
        .with_body(r#"{"status": "processing"}"#)
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/api/emails/status")
        .with_status(200)
        .with_body(r#"{"status": "ready"}"#)
        .create_async()
        .await;

    let assistant = assistant_for(server.url(), true);
    let status = assistant
        .wait_for_emails_ready(Duration::from_millis(10), Duration::MAX)
        .await
        .unwrap();

    assert_eq!(status.status, IngestionStatus::Ready);
    processing.assert_async().await;
}

#[tokio::test]
async fn test_wait_for_emails_with_huge_poll_interval_times_out() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/emails/status")
        .with_status(200)
        .with_body(r#"{"status": "processing"}"#)
        .expect(1)
        .create_async()
        .await;

    let assistant = assistant_for(server.url(), true);
    let err = assistant
        .wait_for_emails_ready(Duration::MAX, Duration::from_secs(1))
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Timeout);
}

#[tokio::test]
async fn test_empty_api_key_rejected_locally() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/config")
        .expect(0)
        .create_async()
        .await;

    let assistant = assistant_for(server.url(), true);
    let err = assistant.set_api_key("   ").await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::ClientError);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_malformed_base_url_keeps_monitor_online() {
    let assistant = assistant_for("not a url".to_string(), true);

    let err = assistant.email_status().await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Unknown);
    assert!(assistant.is_online());
}
