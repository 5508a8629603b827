//! Webhook delivery against a mock HTTP endpoint

use std::sync::Arc;
use std::time::Duration;

use hostguard::alerts::{AlertDispatcher, Notifier, WebhookNotifier};
use hostguard::tasks::BackgroundTasks;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_webhook_posts_alert_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hooks/alerts"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(serde_json::json!({
            "subject": "[web01] CRITICAL: memory usage at 96%",
            "recipient": "ops@example.com",
            "host": "web01",
            "body": "memory: 96%\n",
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let webhook = WebhookNotifier::new(format!("{}/hooks/alerts", mock_server.uri())).unwrap();
    let tasks = Arc::new(BackgroundTasks::new());
    let transports: Vec<Arc<dyn Notifier>> = vec![Arc::new(webhook)];
    let dispatcher = AlertDispatcher::new(transports, tasks.clone(), "ops@example.com", "web01");

    dispatcher.dispatch("CRITICAL: memory usage at 96%", "memory: 96%\n");
    tasks.drain(Duration::from_secs(10)).await;

    mock_server.verify().await;
}

#[tokio::test]
async fn test_webhook_error_status_is_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let webhook = WebhookNotifier::new(mock_server.uri()).unwrap();
    let dispatcher = AlertDispatcher::new(vec![], Arc::new(BackgroundTasks::new()), "root", "db1");

    let result = webhook.send(&dispatcher.alert("WARNING: disk", "sda1")).await;

    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("500"));
}

#[tokio::test]
async fn test_unreachable_webhook_does_not_block_dispatch() {
    let webhook = WebhookNotifier::new("http://127.0.0.1:9/unreachable").unwrap();
    let tasks = Arc::new(BackgroundTasks::new());
    let transports: Vec<Arc<dyn Notifier>> = vec![Arc::new(webhook)];
    let dispatcher = AlertDispatcher::new(transports, tasks.clone(), "root", "db1");

    let started = std::time::Instant::now();
    dispatcher.dispatch("CRITICAL: 1 of 1 servers unreachable", "");
    assert!(started.elapsed() < Duration::from_millis(100));

    tasks.drain(Duration::from_secs(15)).await;
    assert!(tasks.is_empty());
}
