//! Topic publisher trait and types.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::error::QueueError;

/// What the provider handed back for one published message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishReceipt {
    /// Provider message identifier, when the provider assigns one.
    pub message_id: Option<String>,
}

/// Trait for outbound topic backends.
///
/// Implementations deliver one serialized payload to one topic per call.
#[async_trait]
pub trait TopicPublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str) -> Result<PublishReceipt, QueueError>;

    /// Provider name for logs (e.g., "sns").
    fn provider(&self) -> &str;
}

/// Blanket implementation so `Arc<dyn TopicPublisher>` can be used directly.
#[async_trait]
impl<T: TopicPublisher + ?Sized> TopicPublisher for Arc<T> {
    async fn publish(&self, topic: &str, payload: &str) -> Result<PublishReceipt, QueueError> {
        (**self).publish(topic, payload).await
    }

    fn provider(&self) -> &str {
        (**self).provider()
    }
}

/// Logs payloads instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct DryRunPublisher;

#[async_trait]
impl TopicPublisher for DryRunPublisher {
    async fn publish(&self, topic: &str, payload: &str) -> Result<PublishReceipt, QueueError> {
        info!(topic, payload, "dry run: not publishing");
        Ok(PublishReceipt::default())
    }

    fn provider(&self) -> &str {
        "dry-run"
    }
}
