use std::env;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Worker configuration, static for the lifetime of the process
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Bucket the uploaded spreadsheets are read from
    pub input_bucket: String,

    /// Bucket the truncated spreadsheets are written to
    pub output_bucket: String,

    /// URL of the queue announcing new uploads
    pub queue_url: String,

    /// AWS region (default: "us-east-1")
    pub region: String,

    /// Custom endpoint for S3/SQS compatible services (e.g. MinIO, LocalStack)
    pub endpoint_url: Option<String>,

    /// Long-poll wait per receive call in seconds (default: 10, max: 20)
    pub wait_time_seconds: i32,

    /// Data rows kept below the header (default: 10)
    pub row_limit: usize,

    /// Prefix of every derived output key (default: "processed/")
    pub output_prefix: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            input_bucket: String::new(),
            output_bucket: String::new(),
            queue_url: String::new(),
            region: "us-east-1".to_string(),
            endpoint_url: None,
            wait_time_seconds: 10,
            row_limit: 10,
            output_prefix: "processed/".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();
        let required = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        Ok(Self {
            input_bucket: required("S3_INPUT_BUCKET")?,
            output_bucket: required("S3_OUTPUT_BUCKET")?,
            queue_url: required("SQS_QUEUE_URL")?,

            region: lookup("AWS_REGION")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(default.region),

            endpoint_url: lookup("AWS_ENDPOINT_URL").filter(|v| !v.trim().is_empty()),

            wait_time_seconds: parse_or(
                &lookup,
                "QUEUE_WAIT_TIME_SECONDS",
                default.wait_time_seconds,
            )?
                .clamp(0, 20),

            row_limit: parse_or(&lookup, "ROW_LIMIT", default.row_limit)?,

            output_prefix: lookup("OUTPUT_PREFIX").unwrap_or(default.output_prefix),
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid { name, value: v }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("S3_INPUT_BUCKET", "newfiles"),
        ("S3_OUTPUT_BUCKET", "output"),
        ("SQS_QUEUE_URL", "https://sqs.us-east-1.amazonaws.com/000000000000/fileprocessor"),
    ];

    #[test]
    fn test_default_config() {
        let config = WorkerConfig::default();
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.wait_time_seconds, 10);
        assert_eq!(config.row_limit, 10);
        assert_eq!(config.output_prefix, "processed/");
        assert!(config.endpoint_url.is_none());
    }

    #[test]
    fn test_required_values_with_defaults() {
        let config = WorkerConfig::from_lookup(lookup_from(&REQUIRED)).unwrap();
        assert_eq!(config.input_bucket, "newfiles");
        assert_eq!(config.output_bucket, "output");
        assert!(config.queue_url.ends_with("/fileprocessor"));
        assert_eq!(config.row_limit, 10);
        assert_eq!(config.wait_time_seconds, 10);
    }

    #[test]
    fn test_missing_required_value() {
        let err = WorkerConfig::from_lookup(lookup_from(&REQUIRED[..2])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("SQS_QUEUE_URL"));

        let mut blank = REQUIRED.to_vec();
        blank[0] = ("S3_INPUT_BUCKET", "  ");
        let err = WorkerConfig::from_lookup(lookup_from(&blank)).unwrap_err();
        assert_eq!(err, ConfigError::Missing("S3_INPUT_BUCKET"));
    }

    #[test]
    fn test_wait_time_is_clamped() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("QUEUE_WAIT_TIME_SECONDS", "45"));
        let config = WorkerConfig::from_lookup(lookup_from(&vars)).unwrap();
        assert_eq!(config.wait_time_seconds, 20);

        vars.push(("QUEUE_WAIT_TIME_SECONDS", "-3"));
        let config = WorkerConfig::from_lookup(lookup_from(&vars)).unwrap();
        assert_eq!(config.wait_time_seconds, 0);
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("ROW_LIMIT", "ten"));
        let err = WorkerConfig::from_lookup(lookup_from(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "ROW_LIMIT", .. }));
    }

    #[test]
    fn test_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("AWS_REGION", "eu-west-1"));
        vars.push(("AWS_ENDPOINT_URL", "http://127.0.0.1:4566"));
        vars.push(("ROW_LIMIT", "25"));
        vars.push(("OUTPUT_PREFIX", "trimmed/"));
        let config = WorkerConfig::from_lookup(lookup_from(&vars)).unwrap();
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.endpoint_url.as_deref(), Some("http://127.0.0.1:4566"));
        assert_eq!(config.row_limit, 25);
        assert_eq!(config.output_prefix, "trimmed/");
    }
}
