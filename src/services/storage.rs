use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("S3 request failed for s3://{bucket}/{key}: {message}")]
    Request {
        bucket: String,
        key: String,
        message: String,
    },
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }

    fn request(bucket: &str, key: &str, err: impl std::fmt::Display) -> Self {
        StorageError::Request {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: err.to_string(),
        }
    }
}

/// Key-addressed byte storage. Implementations do not retry and do not cache.
#[async_trait]
pub trait StorageService: Send + Sync {
    async fn get_file(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;
    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
    ) -> Result<(), StorageError>;
}

pub struct S3StorageService {
    client: Client,
}

impl S3StorageService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StorageService for S3StorageService {
    async fn get_file(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let res = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await;

        let output = match res {
            Ok(output) => output,
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    return Err(StorageError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    });
                }
                tracing::error!(
                    "S3 get_object failed: bucket={}, key={}, error={:?}",
                    bucket,
                    key,
                    service_error
                );
                return Err(StorageError::request(bucket, key, service_error));
            }
        };

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::request(bucket, key, e))?
            .to_vec();
        Ok(data)
    }

    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
    ) -> Result<(), StorageError> {
        let res = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await;

        if let Err(e) = res {
            tracing::error!(
                "S3 put_object failed: bucket={}, key={}, error={:?}",
                bucket,
                key,
                e
            );
            return Err(StorageError::request(bucket, key, e.into_service_error()));
        }
        Ok(())
    }
}
