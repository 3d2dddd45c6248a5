pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;

use crate::config::WorkerConfig;
use crate::services::file_processor::FileProcessor;
use crate::services::queue::QueueService;
use crate::services::storage::StorageService;
use crate::services::transform::Transform;
use crate::services::worker::QueueWorker;
use std::sync::Arc;

/// Wire a worker from already constructed clients. The clients are shared
/// for the lifetime of the worker.
pub fn create_worker(
    config: &WorkerConfig,
    queue: Arc<dyn QueueService>,
    storage: Arc<dyn StorageService>,
    transform: Arc<dyn Transform>,
) -> QueueWorker {
    let processor = FileProcessor::new(
        storage,
        transform,
        config.input_bucket.clone(),
        config.output_bucket.clone(),
        config.output_prefix.clone(),
    );

    QueueWorker::new(queue, processor, config.wait_time_seconds)
}
