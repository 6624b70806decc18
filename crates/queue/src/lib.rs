pub mod envelope;
pub mod error;
pub mod publisher;
pub mod sns;

pub use envelope::{parse_event, SnsEvent, SnsEventRecord, SnsMessage};
pub use error::QueueError;
pub use publisher::{DryRunPublisher, PublishReceipt, TopicPublisher};
pub use sns::SnsPublisher;
