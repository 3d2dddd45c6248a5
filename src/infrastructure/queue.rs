use crate::config::WorkerConfig;
use crate::services::queue::SqsQueueService;
use aws_config::SdkConfig;
use std::sync::Arc;
use tracing::info;

pub fn setup_queue(aws_config: &SdkConfig, config: &WorkerConfig) -> Arc<SqsQueueService> {
    info!(
        "📬 SQS Queue: {} (wait {}s)",
        config.queue_url, config.wait_time_seconds
    );

    let sqs_client = aws_sdk_sqs::Client::new(aws_config);
    Arc::new(SqsQueueService::new(sqs_client, config.queue_url.clone()))
}
