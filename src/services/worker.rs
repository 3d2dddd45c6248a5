use crate::models::{QueueMessage, WorkItem};
use crate::services::file_processor::FileProcessor;
use crate::services::queue::QueueService;
use std::sync::Arc;

/// Messages requested per receive call. A single lease is held at a time.
const MESSAGES_PER_RECEIVE: i32 = 1;

/// Characters of an unparseable body kept in the log line.
const BODY_PREVIEW_CHARS: usize = 200;

/// Outcome of one receive/process/acknowledge cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollSummary {
    pub received: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Single consumer of the upload queue. One message is in flight at a time
/// and a message is deleted only after its file was processed successfully;
/// everything else is left for the queue to redeliver.
pub struct QueueWorker {
    queue: Arc<dyn QueueService>,
    processor: FileProcessor,
    wait_time_seconds: i32,
}

impl QueueWorker {
    pub fn new(
        queue: Arc<dyn QueueService>,
        processor: FileProcessor,
        wait_time_seconds: i32,
    ) -> Self {
        Self {
            queue,
            processor,
            wait_time_seconds,
        }
    }

    /// Poll forever. The long-poll wait of the receive call is the only
    /// pacing; the loop ends when the process is terminated.
    pub async fn run(&self) {
        tracing::info!("🚀 Polling queue for messages...");

        loop {
            let summary = self.poll_once().await;
            if summary.received > 0 {
                tracing::info!(
                    received = summary.received,
                    deleted = summary.deleted,
                    failed = summary.failed,
                    "Poll cycle finished"
                );
            }
        }
    }

    pub async fn poll_once(&self) -> PollSummary {
        let mut summary = PollSummary::default();

        let messages = match self
            .queue
            .receive_messages(MESSAGES_PER_RECEIVE, self.wait_time_seconds)
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                tracing::error!("❌ Error receiving messages: {}", e);
                return summary;
            }
        };

        for message in messages {
            summary.received += 1;
            if self.handle_message(&message).await {
                summary.deleted += 1;
            } else {
                summary.failed += 1;
            }
        }

        summary
    }

    /// Returns `true` when the message was processed and deleted.
    #[tracing::instrument(
        skip(self, message),
        fields(message_id = message.message_id.as_deref().unwrap_or("unknown"))
    )]
    async fn handle_message(&self, message: &QueueMessage) -> bool {
        let item = match WorkItem::from_body(&message.body) {
            Ok(item) => item,
            Err(e) => {
                // Left on the queue; it will keep failing until purged or dead-lettered.
                tracing::error!(
                    body_len = message.body.len(),
                    "❌ Error handling message: invalid body {:?}: {}",
                    body_preview(&message.body),
                    e
                );
                return false;
            }
        };

        if !self.processor.process(&item.source_key).await {
            return false;
        }

        let Some(receipt_handle) = message.receipt_handle.as_deref() else {
            tracing::warn!("⚠️  No receipt handle for message, it cannot be deleted");
            return false;
        };

        match self.queue.delete_message(receipt_handle).await {
            Ok(()) => {
                tracing::info!("✅ Message processed and deleted from queue.");
                true
            }
            Err(e) => {
                // Redelivery reprocesses into the same output key.
                tracing::error!("❌ Failed to delete message for {}: {}", item.source_key, e);
                false
            }
        }
    }
}

/// At most `BODY_PREVIEW_CHARS` characters of `body`, marked when cut.
fn body_preview(body: &str) -> String {
    match body.char_indices().nth(BODY_PREVIEW_CHARS) {
        Some((end, _)) => format!("{}...", &body[..end]),
        None => body.to_string(),
    }
}
