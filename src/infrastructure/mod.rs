pub mod queue;
pub mod storage;

use crate::config::WorkerConfig;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_s3::config::Region;
use tracing::info;

/// Shared AWS configuration for every client the worker builds.
pub async fn load_aws_config(config: &WorkerConfig) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()));

    if let Some(endpoint_url) = &config.endpoint_url {
        info!("🔌 Using custom AWS endpoint: {}", endpoint_url);
        loader = loader.endpoint_url(endpoint_url);
    }

    loader.load().await
}
