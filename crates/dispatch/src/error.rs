use fanout_core::NotificationError;
use fanout_queue::QueueError;

/// Errors that abort a fan-out invocation.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Notification(#[from] NotificationError),

    #[error("envelope error: {0}")]
    Envelope(#[from] QueueError),

    #[error("failed to serialize notification for handler {handler}: {source}")]
    Serialize {
        handler: String,
        source: serde_json::Error,
    },

    #[error("failed to publish notification for handler {handler}: {source}")]
    Publish { handler: String, source: QueueError },
}

impl DispatchError {
    /// Handler whose emission failed, if the failure happened mid fan-out.
    pub fn handler(&self) -> Option<&str> {
        match self {
            DispatchError::Serialize { handler, .. } | DispatchError::Publish { handler, .. } => {
                Some(handler.as_str())
            }
            _ => None,
        }
    }
}
