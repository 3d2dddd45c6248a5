use crate::services::storage::{StorageError, StorageService};
use crate::services::transform::{Transform, TransformError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Download failed: {0}")]
    Download(#[source] StorageError),

    #[error("Transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("Source key {0:?} has no file name")]
    InvalidKey(String),

    #[error("Upload failed: {0}")]
    Upload(#[source] StorageError),
}

/// Output location for a source key: `prefix` + the last path segment.
/// Returns `None` when the key has no last segment (empty or ends in `/`).
pub fn derive_output_key(prefix: &str, source_key: &str) -> Option<String> {
    let basename = source_key.rsplit('/').next().unwrap_or_default();
    if basename.is_empty() {
        return None;
    }
    Some(format!("{}{}", prefix, basename))
}

/// Runs one download, transform, upload cycle per source key.
pub struct FileProcessor {
    storage: Arc<dyn StorageService>,
    transform: Arc<dyn Transform>,
    input_bucket: String,
    output_bucket: String,
    output_prefix: String,
}

impl FileProcessor {
    pub fn new(
        storage: Arc<dyn StorageService>,
        transform: Arc<dyn Transform>,
        input_bucket: String,
        output_bucket: String,
        output_prefix: String,
    ) -> Self {
        Self {
            storage,
            transform,
            input_bucket,
            output_bucket,
            output_prefix,
        }
    }

    /// Process `source_key`, containing every failure. Returns `true` only
    /// when the truncated file was uploaded.
    ///
    /// Safe to repeat: the output key depends only on the source key, so a
    /// rerun overwrites the earlier result.
    pub async fn process(&self, source_key: &str) -> bool {
        match self.try_process(source_key).await {
            Ok(output_key) => {
                info!(
                    "✅ Uploaded processed file to: s3://{}/{}",
                    self.output_bucket, output_key
                );
                true
            }
            Err(e) => {
                error!(source_key = %source_key, "❌ Failed to process {}: {}", source_key, e);
                false
            }
        }
    }

    /// Upload is the last step, so nothing is published unless every step
    /// before it succeeded.
    pub async fn try_process(&self, source_key: &str) -> Result<String, ProcessError> {
        let output_key = derive_output_key(&self.output_prefix, source_key)
            .ok_or_else(|| ProcessError::InvalidKey(source_key.to_string()))?;

        info!("📥 Downloading file: s3://{}/{}", self.input_bucket, source_key);
        let data = self
            .storage
            .get_file(&self.input_bucket, source_key)
            .await
            .map_err(ProcessError::Download)?;

        let processed = self.transform.apply(&data)?;

        self.storage
            .upload_file(&self.output_bucket, &output_key, processed)
            .await
            .map_err(ProcessError::Upload)?;

        Ok(output_key)
    }
}
