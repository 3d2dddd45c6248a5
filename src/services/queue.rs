use crate::models::QueueMessage;
use async_trait::async_trait;
use aws_sdk_sqs::Client;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Failed to receive messages: {0}")]
    Receive(String),

    #[error("Failed to delete message: {0}")]
    Delete(String),
}

/// Queue with visibility-timeout redelivery. Unacknowledged messages come back
/// on their own; nothing here retries.
#[async_trait]
pub trait QueueService: Send + Sync {
    /// Long-poll for up to `max_messages`, waiting at most `wait_time_seconds`.
    /// An empty result is not an error.
    async fn receive_messages(
        &self,
        max_messages: i32,
        wait_time_seconds: i32,
    ) -> Result<Vec<QueueMessage>, QueueError>;

    async fn delete_message(&self, receipt_handle: &str) -> Result<(), QueueError>;
}

pub struct SqsQueueService {
    client: Client,
    queue_url: String,
}

impl SqsQueueService {
    pub fn new(client: Client, queue_url: String) -> Self {
        Self { client, queue_url }
    }
}

#[async_trait]
impl QueueService for SqsQueueService {
    async fn receive_messages(
        &self,
        max_messages: i32,
        wait_time_seconds: i32,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages)
            .wait_time_seconds(wait_time_seconds)
            .send()
            .await
            .map_err(|e| QueueError::Receive(e.into_service_error().to_string()))?;

        Ok(output
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|m| QueueMessage {
                message_id: m.message_id,
                body: m.body.unwrap_or_default(),
                receipt_handle: m.receipt_handle,
            })
            .collect())
    }

    async fn delete_message(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Delete(e.into_service_error().to_string()))?;
        Ok(())
    }
}
