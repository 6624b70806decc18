//! Fans a resource notification out to its metric handlers.
//!
//! The dispatcher picks the handlers an inbound notification applies to and
//! publishes one outbound notification per handler onto the worker topic.
//! Publishes are sequential; the first failure aborts the remaining ones.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use fanout_core::{HandlerRegistry, InboundNotification, OutboundNotification};
use fanout_queue::{QueueError, SnsEvent, TopicPublisher};

use crate::error::DispatchError;
use crate::report::{DispatchReport, DispatchedHandler};

/// Publishes one worker notification per selected handler.
pub struct Dispatcher {
    registry: Arc<dyn HandlerRegistry>,
    publisher: Arc<dyn TopicPublisher>,
    /// Outbound worker topic.
    topic: String,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<dyn HandlerRegistry>,
        publisher: Arc<dyn TopicPublisher>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            publisher,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Handlers `inbound` should be sent to.
    ///
    /// An explicit, non-empty `resources` list is filtered against the
    /// registry in request order; unknown slugs and non-string entries are
    /// dropped and repeats collapse to their first occurrence. Otherwise
    /// every registered handler is selected, in registry order.
    pub fn select_handlers<'a>(&'a self, inbound: &'a InboundNotification) -> Vec<&'a str> {
        let Some(requested) = inbound.requested_handlers() else {
            return self.registry.slugs().iter().map(String::as_str).collect();
        };

        let mut selected: Vec<&str> = Vec::with_capacity(requested.len());
        for slug in requested {
            if !self.registry.has_slug(slug) {
                debug!(resource_id = %inbound.id, handler = %slug, "Skipping unregistered handler");
                continue;
            }
            if !selected.contains(&slug) {
                selected.push(slug);
            }
        }
        selected
    }

    /// Lazily build the outbound notifications for `inbound`.
    ///
    /// Calling this again on the same input yields the same sequence.
    pub fn plan<'a>(
        &'a self,
        inbound: &'a InboundNotification,
    ) -> impl Iterator<Item = OutboundNotification> + 'a {
        self.select_handlers(inbound)
            .into_iter()
            .map(move |handler| OutboundNotification::for_handler(inbound, handler))
    }

    /// Publish every planned notification for `inbound` to the worker topic.
    pub async fn dispatch(
        &self,
        inbound: &InboundNotification,
    ) -> Result<DispatchReport, DispatchError> {
        debug!(
            resource_id = %inbound.id,
            version = %inbound.version,
            "Handling event for resource"
        );

        let mut report = DispatchReport::new(inbound);

        for outbound in self.plan(inbound) {
            let handler = outbound.handler().to_string();
            debug!(resource_id = %inbound.id, handler = %handler, "Sending compute event");

            let payload = match outbound.to_json() {
                Ok(payload) => payload,
                Err(source) => return Err(DispatchError::Serialize { handler, source }),
            };

            let start = Instant::now();
            let result = self.publisher.publish(&self.topic, &payload).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(receipt) => {
                    debug!(
                        resource_id = %inbound.id,
                        handler = %handler,
                        provider = self.publisher.provider(),
                        message_id = receipt.message_id.as_deref().unwrap_or("-"),
                        duration_ms,
                        "Compute event published"
                    );
                    report.dispatched.push(DispatchedHandler {
                        handler,
                        message_id: receipt.message_id,
                    });
                }
                Err(source) => {
                    warn!(
                        resource_id = %inbound.id,
                        handler = %handler,
                        provider = self.publisher.provider(),
                        error = %source,
                        duration_ms,
                        "Compute event publish failed, aborting fan-out"
                    );
                    return Err(DispatchError::Publish { handler, source });
                }
            }
        }

        debug!(
            resource_id = %inbound.id,
            version = %inbound.version,
            handlers = report.dispatched.len(),
            "Successfully handled event for resource"
        );

        Ok(report)
    }

    /// Decode a raw notification payload and dispatch it.
    ///
    /// Decoding and validation happen before anything is published.
    pub async fn handle_message(&self, message: &str) -> Result<DispatchReport, DispatchError> {
        let inbound = InboundNotification::decode(message)?;
        self.dispatch(&inbound).await
    }

    /// Handle every record of an SNS delivery, in order.
    pub async fn handle_event(&self, event: &SnsEvent) -> Result<Vec<DispatchReport>, DispatchError> {
        if event.is_empty() {
            return Err(QueueError::Parse("SNS event contains no records".into()).into());
        }

        let mut reports = Vec::with_capacity(event.records.len());
        for message in event.messages() {
            debug!(message_id = %message.message_id, "Received event");
            reports.push(self.handle_message(&message.message).await?);
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use fanout_core::{NotificationError, StaticRegistry};
    use fanout_queue::PublishReceipt;

    /// Records every publish; fails once `fail_after` publishes have succeeded.
    #[derive(Default)]
    struct MockPublisher {
        sent: Mutex<Vec<(String, String)>>,
        fail_after: Option<usize>,
    }

    impl MockPublisher {
        fn failing_after(n: usize) -> Self {
            Self {
                fail_after: Some(n),
                ..Default::default()
            }
        }

        fn handlers(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|(_, payload)| {
                    let out: OutboundNotification = serde_json::from_str(payload).unwrap();
                    out.handler().to_string()
                })
                .collect()
        }
    }

    #[async_trait::async_trait]
    impl TopicPublisher for MockPublisher {
        async fn publish(&self, topic: &str, payload: &str) -> Result<PublishReceipt, QueueError> {
            let mut sent = self.sent.lock().unwrap();
            if self.fail_after == Some(sent.len()) {
                return Err(QueueError::Connection("mock failure".to_string()));
            }
            sent.push((topic.to_string(), payload.to_string()));
            Ok(PublishReceipt {
                message_id: Some(format!("msg-{}", sent.len())),
            })
        }

        fn provider(&self) -> &str {
            "mock"
        }
    }

    const TOPIC: &str = "arn:aws:sns:us-east-1:123456789012:workers";

    fn dispatcher(slugs: &[&str], publisher: Arc<MockPublisher>) -> Dispatcher {
        let registry = StaticRegistry::new(slugs.iter().copied()).unwrap();
        Dispatcher::new(Arc::new(registry), publisher, TOPIC)
    }

    fn inbound(json: &str) -> InboundNotification {
        InboundNotification::decode(json).unwrap()
    }

    #[test]
    fn select_all_when_resources_absent_or_empty() {
        let d = dispatcher(&["ndvi", "evi", "savi"], Arc::default());
        let absent = inbound(r#"{"id":"a","version":"1"}"#);
        let empty = inbound(r#"{"id":"a","version":"1","resources":[]}"#);
        assert_eq!(d.select_handlers(&absent), ["ndvi", "evi", "savi"]);
        assert_eq!(d.select_handlers(&empty), ["ndvi", "evi", "savi"]);
    }

    #[test]
    fn select_filters_unknown_and_keeps_request_order() {
        let d = dispatcher(&["ndvi", "evi", "savi"], Arc::default());
        let n = inbound(r#"{"id":"a","version":"1","resources":["savi","lai","ndvi","savi"]}"#);
        assert_eq!(d.select_handlers(&n), ["savi", "ndvi"]);
    }

    #[test]
    fn select_skips_non_string_entries() {
        let d = dispatcher(&["ndvi", "evi"], Arc::default());
        let n = inbound(r#"{"id":"a","version":"1","resources":["ndvi",7,null]}"#);
        assert_eq!(d.select_handlers(&n), ["ndvi"]);
    }

    #[test]
    fn select_nothing_when_all_requested_are_unknown() {
        let d = dispatcher(&["ndvi"], Arc::default());
        let n = inbound(r#"{"id":"a","version":"1","resources":["lai"]}"#);
        assert!(d.select_handlers(&n).is_empty());
        assert_eq!(d.plan(&n).count(), 0);
    }

    #[test]
    fn plan_is_restartable() {
        let d = dispatcher(&["ndvi", "evi"], Arc::default());
        let n = inbound(r#"{"id":"xyz","version":"1"}"#);
        let first: Vec<_> = d.plan(&n).collect();
        let second: Vec<_> = d.plan(&n).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|o| o.notification == n));
    }

    #[tokio::test]
    async fn dispatch_publishes_one_message_per_handler() {
        let publisher = Arc::new(MockPublisher::default());
        let d = dispatcher(&["ndvi", "evi"], publisher.clone());

        let report = d.handle_message(r#"{"id":"xyz","version":"1"}"#).await.unwrap();

        assert_eq!(report.resource_id, "xyz");
        assert_eq!(report.handlers(), ["ndvi", "evi"]);
        assert_eq!(report.dispatched[1].message_id.as_deref(), Some("msg-2"));
        assert_eq!(publisher.handlers(), ["ndvi", "evi"]);
        assert!(publisher.sent.lock().unwrap().iter().all(|(t, _)| t == d.topic()));
    }

    #[tokio::test]
    async fn missing_field_publishes_nothing() {
        let publisher = Arc::new(MockPublisher::default());
        let d = dispatcher(&["ndvi"], publisher.clone());

        let err = d.handle_message(r#"{"version":"1"}"#).await.unwrap_err();

        assert!(matches!(
            err,
            DispatchError::Notification(NotificationError::MissingField("id"))
        ));
        assert!(err.handler().is_none());
        assert!(publisher.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn publish_failure_aborts_remaining_handlers() {
        let publisher = Arc::new(MockPublisher::failing_after(1));
        let d = dispatcher(&["ndvi", "evi", "savi"], publisher.clone());

        let err = d.handle_message(r#"{"id":"a","version":"1"}"#).await.unwrap_err();

        assert!(matches!(err, DispatchError::Publish { .. }));
        assert_eq!(err.handler(), Some("evi"));
        assert_eq!(publisher.handlers(), ["ndvi"]);
    }

    #[tokio::test]
    async fn empty_event_is_rejected() {
        let d = dispatcher(&["ndvi"], Arc::default());
        let err = d.handle_event(&SnsEvent { records: Vec::new() }).await.unwrap_err();
        assert!(matches!(err, DispatchError::Envelope(QueueError::Parse(_))));
    }
}
