use crate::config::WorkerConfig;
use crate::services::storage::S3StorageService;
use aws_config::SdkConfig;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn setup_storage(aws_config: &SdkConfig, config: &WorkerConfig) -> Arc<S3StorageService> {
    info!(
        "☁️  S3 Storage: input={} output={} (Region: {})",
        config.input_bucket, config.output_bucket, config.region
    );

    // Path-style addressing for S3-compatible endpoints such as MinIO
    let s3_config = aws_sdk_s3::config::Builder::from(aws_config)
        .force_path_style(config.endpoint_url.is_some())
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

    // Buckets are provisioned elsewhere; only report whether they are reachable
    for bucket in [&config.input_bucket, &config.output_bucket] {
        match s3_client.head_bucket().bucket(bucket).send().await {
            Ok(_) => info!("✅ Bucket '{}' is ready", bucket),
            Err(e) => warn!(
                "⚠️  Bucket '{}' is not reachable yet: {}",
                bucket,
                e.into_service_error()
            ),
        }
    }

    Arc::new(S3StorageService::new(s3_client))
}
