//! End-to-end fan-out: SNS envelope in, worker payloads out.

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use fanout_core::StaticRegistry;
use fanout_dispatch::{DispatchError, Dispatcher};
use fanout_queue::{parse_event, PublishReceipt, QueueError, TopicPublisher};

const TOPIC: &str = "arn:aws:sns:us-east-1:123456789012:metric-workers";

#[derive(Default)]
struct RecordingPublisher {
    payloads: Mutex<Vec<String>>,
}

impl RecordingPublisher {
    fn payloads(&self) -> Vec<Value> {
        self.payloads
            .lock()
            .unwrap()
            .iter()
            .map(|p| serde_json::from_str(p).unwrap())
            .collect()
    }
}

#[async_trait::async_trait]
impl TopicPublisher for RecordingPublisher {
    async fn publish(&self, topic: &str, payload: &str) -> Result<PublishReceipt, QueueError> {
        assert_eq!(topic, TOPIC);
        self.payloads.lock().unwrap().push(payload.to_string());
        Ok(PublishReceipt::default())
    }

    fn provider(&self) -> &str {
        "recording"
    }
}

fn setup(slugs: &[&str]) -> (Dispatcher, Arc<RecordingPublisher>) {
    let publisher = Arc::new(RecordingPublisher::default());
    let registry = StaticRegistry::new(slugs.iter().copied()).unwrap();
    let dispatcher = Dispatcher::new(Arc::new(registry), publisher.clone(), TOPIC);
    (dispatcher, publisher)
}

/// Wrap a notification the way SNS delivers it to a Lambda subscriber.
fn envelope(message: &Value) -> String {
    json!({
        "Records": [{
            "EventSource": "aws:sns",
            "Sns": {
                "MessageId": "2f1b8d8e-54f5-5b5c-9c7d-4b1f0e9a6c11",
                "TopicArn": "arn:aws:sns:us-east-1:123456789012:metric-manager",
                "Message": message.to_string()
            }
        }]
    })
    .to_string()
}

#[tokio::test]
async fn explicit_resource_is_dispatched_alone() {
    let (dispatcher, publisher) = setup(&["ndvi", "evi", "savi"]);
    let event = parse_event(&envelope(
        &json!({"id": "abc123", "version": "2", "resources": ["ndvi"]}),
    ))
    .unwrap();

    let reports = dispatcher.handle_event(&event).await.unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].handlers(), ["ndvi"]);
    assert_eq!(
        publisher.payloads(),
        [json!({
            "id": "abc123",
            "version": "2",
            "resources": ["ndvi"],
            "meta": {"worker": {"handler": "ndvi"}}
        })]
    );
}

#[tokio::test]
async fn no_resources_dispatches_whole_registry() {
    let (dispatcher, publisher) = setup(&["ndvi", "evi"]);
    let event = parse_event(&envelope(&json!({"id": "xyz", "version": "1"}))).unwrap();

    dispatcher.handle_event(&event).await.unwrap();

    assert_eq!(
        publisher.payloads(),
        [
            json!({"id": "xyz", "version": "1", "meta": {"worker": {"handler": "ndvi"}}}),
            json!({"id": "xyz", "version": "1", "meta": {"worker": {"handler": "evi"}}}),
        ]
    );
}

#[tokio::test]
async fn two_registered_resources_keep_id_and_version() {
    let (dispatcher, publisher) = setup(&["ndvi", "evi", "savi"]);
    let message = json!({
        "id": "res-9",
        "version": 4,
        "resources": ["evi", "savi"],
        "geostore": "0a1b2c"
    });

    let report = dispatcher.handle_message(&message.to_string()).await.unwrap();

    assert_eq!(report.handlers(), ["evi", "savi"]);
    let payloads = publisher.payloads();
    assert_eq!(payloads.len(), 2);
    for (payload, handler) in payloads.iter().zip(["evi", "savi"]) {
        assert_eq!(payload["id"], "res-9");
        assert_eq!(payload["version"], 4);
        assert_eq!(payload["geostore"], "0a1b2c");
        assert_eq!(payload["meta"]["worker"]["handler"], handler);
    }
}

#[tokio::test]
async fn unregistered_resources_are_dropped() {
    let (dispatcher, publisher) = setup(&["ndvi", "evi"]);
    let message = json!({"id": "r", "version": "1", "resources": ["unknown", "evi"]});

    dispatcher.handle_message(&message.to_string()).await.unwrap();

    let handlers: Vec<Value> = publisher
        .payloads()
        .into_iter()
        .map(|p| p["meta"]["worker"]["handler"].clone())
        .collect();
    assert_eq!(handlers, [json!("evi")]);
}

#[tokio::test]
async fn missing_version_fails_before_publishing() {
    let (dispatcher, publisher) = setup(&["ndvi"]);
    let event = parse_event(&envelope(&json!({"id": "abc123"}))).unwrap();

    let err = dispatcher.handle_event(&event).await.unwrap_err();

    assert!(matches!(err, DispatchError::Notification(_)));
    assert_eq!(err.to_string(), "missing required key: version");
    assert!(publisher.payloads().is_empty());
}

#[tokio::test]
async fn malformed_message_is_a_decode_error() {
    let (dispatcher, publisher) = setup(&["ndvi"]);

    let err = dispatcher.handle_message("{not json").await.unwrap_err();

    assert!(err.to_string().starts_with("invalid notification payload"));
    assert!(publisher.payloads().is_empty());
}

#[tokio::test]
async fn repeated_runs_publish_identical_payloads() {
    let (dispatcher, publisher) = setup(&["ndvi", "evi", "savi"]);
    let message = json!({"id": "r", "version": "3", "extra": {"b": 1, "a": 2}}).to_string();

    dispatcher.handle_message(&message).await.unwrap();
    dispatcher.handle_message(&message).await.unwrap();

    let payloads = publisher.payloads();
    assert_eq!(payloads.len(), 6);
    assert_eq!(payloads[..3], payloads[3..]);
}

#[tokio::test]
async fn wide_numbers_reach_workers_unchanged() {
    let (dispatcher, publisher) = setup(&["ndvi"]);
    let message = r#"{"id":"x","version":"1","area_id":123456789012345678901234567890}"#;

    dispatcher.handle_message(message).await.unwrap();

    let raw = publisher.payloads.lock().unwrap().clone();
    assert_eq!(
        raw,
        [r#"{"id":"x","version":"1","area_id":123456789012345678901234567890,"meta":{"worker":{"handler":"ndvi"}}}"#]
    );
}

#[tokio::test]
async fn non_string_resources_do_not_reject_the_message() {
    let (dispatcher, publisher) = setup(&["ndvi", "evi"]);
    let message = json!({"id": "r", "version": "1", "resources": ["ndvi", 7]});

    let report = dispatcher.handle_message(&message.to_string()).await.unwrap();

    assert_eq!(report.handlers(), ["ndvi"]);
    assert_eq!(publisher.payloads()[0]["resources"], json!(["ndvi", 7]));
}
