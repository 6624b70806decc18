//! SNS delivery envelope.
//!
//! SNS wraps every published message in a `Records` array before handing it
//! to a subscriber. Only the fields the fan-out needs are modelled; anything
//! else in the envelope is ignored.

use serde::{Deserialize, Serialize};

use crate::error::QueueError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnsEvent {
    #[serde(rename = "Records")]
    pub records: Vec<SnsEventRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnsEventRecord {
    #[serde(rename = "Sns")]
    pub sns: SnsMessage,
}

/// A single SNS message as delivered to a subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnsMessage {
    #[serde(rename = "MessageId")]
    pub message_id: String,
    /// Raw message body (JSON string).
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "TopicArn", default, skip_serializing_if = "Option::is_none")]
    pub topic_arn: Option<String>,
    #[serde(rename = "Subject", default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl SnsEvent {
    pub fn messages(&self) -> impl Iterator<Item = &SnsMessage> {
        self.records.iter().map(|r| &r.sns)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parse a raw SNS event envelope.
///
/// Rejects invalid JSON, envelopes of the wrong shape, and envelopes with no
/// records.
pub fn parse_event(body: &str) -> Result<SnsEvent, QueueError> {
    let event: SnsEvent = serde_json::from_str(body)
        .map_err(|e| QueueError::Parse(format!("Invalid SNS event: {e}")))?;

    if event.is_empty() {
        return Err(QueueError::Parse("SNS event contains no records".into()));
    }

    Ok(event)
}
