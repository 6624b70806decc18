//! AWS SNS publisher implementation.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_sns::config::Region;
use aws_sdk_sns::error::SdkError;
use aws_sdk_sns::Client;
use tracing::{debug, info};

use fanout_core::config::AwsConfig;

use crate::error::QueueError;
use crate::publisher::{PublishReceipt, TopicPublisher};

/// SNS-backed topic publisher.
pub struct SnsPublisher {
    client: Client,
}

impl SnsPublisher {
    /// Create a new SNS publisher from project config.
    ///
    /// Credentials come from the default provider chain (the Lambda execution
    /// role in production) unless static keys are configured.
    pub async fn new(aws: &AwsConfig) -> Self {
        let region = Region::new(aws.region.clone());
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(region)
            .load()
            .await;

        let mut sns_config = aws_sdk_sns::config::Builder::from(&shared);

        // Use static credentials if provided (local dev / explicit config).
        if let (Some(key_id), Some(secret)) = (&aws.access_key_id, &aws.secret_access_key) {
            let creds = Credentials::new(
                key_id,
                secret,
                aws.session_token.clone(),
                None,
                "fanout-queue-static",
            );
            sns_config = sns_config.credentials_provider(creds);
        }

        if let Some(ref endpoint) = aws.endpoint_url {
            let url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
                endpoint.clone()
            } else {
                format!("https://{endpoint}")
            };
            sns_config = sns_config.endpoint_url(url);
        }

        let client = Client::from_conf(sns_config.build());

        info!(region = %aws.region, "SNS publisher initialized");

        Self { client }
    }
}

#[async_trait]
impl TopicPublisher for SnsPublisher {
    async fn publish(&self, topic: &str, payload: &str) -> Result<PublishReceipt, QueueError> {
        debug!(topic, bytes = payload.len(), "Publishing to SNS");

        let resp = self
            .client
            .publish()
            .topic_arn(topic)
            .message(payload)
            .send()
            .await
            .map_err(|e| match e {
                SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
                    QueueError::Connection(format!("SNS publish failed: {e:?}"))
                }
                other => QueueError::Provider(format!("SNS publish failed: {other:?}")),
            })?;

        Ok(PublishReceipt {
            message_id: resp.message_id().map(str::to_string),
        })
    }

    fn provider(&self) -> &str {
        "sns"
    }
}
