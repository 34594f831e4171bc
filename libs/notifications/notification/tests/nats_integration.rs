//! Notification helper against a real NATS server.
//!
//! Needs Docker. Run with `cargo test -p notification -- --ignored`.

use async_nats::jetstream;
use futures::StreamExt;
use notification::{
    NatsBroker, NotificationHelper, NotificationHelperConfig, RegistrationRequest, Trigger,
};
use std::collections::HashMap;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::nats::Nats;

async fn start_nats() -> (ContainerAsync<Nats>, String) {
    let container = Nats::default()
        .with_tag("latest")
        .with_cmd(["-js"])
        .start()
        .await
        .expect("Failed to start NATS container");

    let port = container
        .get_host_port_ipv4(4222)
        .await
        .expect("Failed to get NATS port");

    (container, format!("nats://127.0.0.1:{port}"))
}

fn templates() -> HashMap<String, RegistrationRequest> {
    let mut templates = HashMap::new();
    templates.insert(
        "welcome-en".to_string(),
        RegistrationRequest {
            name: "welcome-en".to_string(),
            handler: "email".to_string(),
            body_template_path: "/templates/welcome.body".to_string(),
            subject_template_path: "/templates/welcome.subject".to_string(),
            persistent: false,
        },
    );
    templates
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_start_provisions_stream_and_bucket() {
    let (_container, url) = start_nats().await;
    let config = NotificationHelperConfig::new(&url).with_stream("it-notifications");

    let helper: NotificationHelper<NatsBroker> =
        NotificationHelper::start("it", config.clone(), &templates())
            .await
            .unwrap();

    let js = helper.broker().jetstream().clone();
    let mut stream = js.get_stream("it-notifications").await.unwrap();
    let subjects = stream.info().await.unwrap().config.subjects.clone();
    assert!(subjects.contains(&"it-notifications.trigger".to_string()));

    let bucket = js.get_key_value("it-notifications-template").await.unwrap();
    let stored = bucket.get("welcome-en").await.unwrap().unwrap();
    let parsed: RegistrationRequest = serde_json::from_slice(&stored).unwrap();
    assert_eq!(parsed.name, "welcome-en");

    // A second helper finds the stream in place.
    let again = NotificationHelper::start("it", config, &HashMap::new())
        .await
        .unwrap();
    again.try_stop().await.unwrap();
    helper.try_stop().await.unwrap();
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_trigger_lands_on_stream() {
    let (_container, url) = start_nats().await;
    let config = NotificationHelperConfig::new(&url).with_stream("it-triggers");
    let helper = NotificationHelper::start("it", config, &HashMap::new())
        .await
        .unwrap();

    let trigger = Trigger::new("share-created", "noreply@example.com").with_param("file", "a.txt");
    helper.trigger_notification(&trigger).await;

    let js = helper.broker().jetstream().clone();
    let stream = js.get_stream("it-triggers").await.unwrap();
    let consumer = stream
        .create_consumer(jetstream::consumer::pull::Config {
            filter_subject: "it-triggers.trigger".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let mut messages = consumer.fetch().max_messages(1).messages().await.unwrap();
    let message = messages.next().await.unwrap().unwrap();
    let received: Trigger = serde_json::from_slice(&message.payload).unwrap();

    assert_eq!(received, trigger);
    assert_eq!(helper.failure_count(), 0);
    helper.try_stop().await.unwrap();
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_unreachable_server_fails_to_start() {
    let config = NotificationHelperConfig::new("nats://127.0.0.1:1");
    let result = NotificationHelper::start("it", config, &HashMap::new()).await;

    assert!(matches!(
        result,
        Err(notification::HelperError::Connection { .. })
    ));
}
