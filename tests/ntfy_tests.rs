use std::{sync::Arc, time::Duration};

use anyhow::Result;
use notify_service::{
    clients::{
        ntfy::NtfyClient,
        relay::{LoggingHandler, ProviderRelay},
    },
    models::{channel::ChannelType, message::NotificationMessage},
    worker::handler::{ChannelHandler, HandlerRegistry},
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, body_string, header, method, path},
};

fn message(notification_type: &str) -> NotificationMessage {
    NotificationMessage {
        notification_id: 12,
        user_id: "user_1".to_string(),
        title: "Build finished".to_string(),
        priority: "4".to_string(),
        message: "hi".to_string(),
        notification_type: notification_type.to_string(),
    }
}

/// Test: Push posts the body to the topic with title and priority headers
#[tokio::test]
async fn test_push_sends_headers_and_body() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/alerts"))
        .and(header("Title", "Build finished"))
        .and(header("X-Priority", "4"))
        .and(header("Content-Type", "text/plain"))
        .and(body_string("hi"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = NtfyClient::new(&server.uri(), "alerts", Duration::from_secs(5))?;
    client.deliver(&message("push")).await?;

    Ok(())
}

/// Test: 202 Accepted counts as delivered
#[tokio::test]
async fn test_push_accepts_202() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let client = NtfyClient::new(&format!("{}/", server.uri()), "alerts", Duration::from_secs(5))?;
    client.send_push("t", "3", "body").await?;

    Ok(())
}

/// Test: Any other status is a delivery failure
#[tokio::test]
async fn test_push_error_status_fails() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let client = NtfyClient::new(&server.uri(), "alerts", Duration::from_secs(5))?;
    let err = client
        .deliver(&message("push"))
        .await
        .expect_err("500 should fail");

    assert!(err.to_string().contains("500"));

    Ok(())
}

/// Test: A slow ntfy server is cut off by the request timeout
#[tokio::test]
async fn test_push_times_out() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let client = NtfyClient::new(&server.uri(), "alerts", Duration::from_millis(200))?;
    assert!(client.deliver(&message("push")).await.is_err());

    Ok(())
}

/// Test: Relay forwards the message as JSON and maps status codes
#[tokio::test]
async fn test_provider_relay_posts_json() -> Result<()> {
    let server = MockServer::start().await;
    let email = message("email");

    Mock::given(method("POST"))
        .and(path("/send"))
        .and(body_json(&email))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let relay = ProviderRelay::new(
        ChannelType::Email,
        &format!("{}/send", server.uri()),
        Duration::from_secs(5),
    )?;
    relay.deliver(&email).await?;

    Ok(())
}

#[tokio::test]
async fn test_provider_relay_error_status_fails() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .mount(&server)
        .await;

    let relay = ProviderRelay::new(ChannelType::Sms, &server.uri(), Duration::from_secs(5))?;
    let err = relay
        .deliver(&message("sms"))
        .await
        .expect_err("503 should fail");

    assert!(err.to_string().contains("503"));

    Ok(())
}

/// Test: Registry resolves registered handlers only
#[tokio::test]
async fn test_registry_resolution() -> Result<()> {
    let registry = HandlerRegistry::new()
        .register(ChannelType::Sms, Arc::new(LoggingHandler::new(ChannelType::Sms)));

    let (channel, handler) = registry.resolve("SMS").expect("sms is registered");
    assert_eq!(channel, ChannelType::Sms);
    handler.deliver(&message("sms")).await?;

    assert!(registry.resolve("push").is_none());
    assert!(registry.resolve("fax").is_none());
    assert_eq!(registry.channels().count(), 1);

    Ok(())
}
