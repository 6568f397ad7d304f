//! Object storage for raw video bytes, backed by S3/MinIO
//!
//! The upload size ceiling lives here, at the adapter boundary: an oversized
//! payload is rejected before any byte is written, so a rejected upload
//! leaves no partial blob behind.

use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};
use presence_common::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// Upload ceiling: 200 MiB
pub const MAX_UPLOAD_BYTES: u64 = 200 * 1024 * 1024;

/// S3/MinIO configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// S3 bucket name
    pub bucket: String,

    /// AWS region (e.g., "us-west-2") or "us-east-1" for `MinIO`
    pub region: String,

    /// S3 endpoint (custom for `MinIO`, empty for AWS S3)
    pub endpoint: Option<String>,

    /// AWS access key ID
    pub access_key_id: String,

    /// AWS secret access key
    pub secret_access_key: String,

    /// Path prefix for all objects (e.g., "uploads/")
    pub prefix: String,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: "presence-videos".to_string(),
            region: "us-west-2".to_string(),
            endpoint: std::env::var("S3_ENDPOINT").ok(),
            access_key_id: std::env::var("AWS_ACCESS_KEY_ID").unwrap_or_default(),
            secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").unwrap_or_default(),
            prefix: String::new(),
        }
    }
}

/// Reject a payload that exceeds the upload ceiling
pub(crate) fn check_payload_size(size: u64) -> Result<()> {
    if size > MAX_UPLOAD_BYTES {
        return Err(PipelineError::PayloadTooLarge {
            size,
            max: MAX_UPLOAD_BYTES,
        });
    }
    Ok(())
}

/// Object storage trait
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store raw bytes under a key, enforcing the upload ceiling.
    /// Returns the stored key.
    async fn store(&self, key: &str, data: &[u8]) -> Result<String>;

    /// Retrieve the bytes stored under a key
    async fn fetch(&self, key: &str) -> Result<Vec<u8>>;

    /// Delete the object stored under a key
    async fn delete(&self, key: &str) -> Result<()>;
}

/// S3/MinIO object storage implementation
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3ObjectStore {
    /// Create a new S3 object storage client
    pub async fn new(config: S3Config) -> Result<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "presence-storage",
        );

        let region = Region::new(config.region.clone());

        let mut s3_config_builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(region)
            .behavior_version_latest();

        // Set custom endpoint for MinIO
        if let Some(endpoint) = config.endpoint {
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint)
                .force_path_style(true); // Required for MinIO
        }

        let s3_config = s3_config_builder.build();
        let client = Client::from_conf(s3_config);

        Ok(Self {
            client,
            bucket: config.bucket,
            prefix: config.prefix,
        })
    }

    /// Combine prefix with key
    fn full_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}{}", self.prefix, key)
        }
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3ObjectStore {
    async fn store(&self, key: &str, data: &[u8]) -> Result<String> {
        check_payload_size(data.len() as u64)?;

        let full_key = self.full_key(key);
        let byte_stream = ByteStream::from(data.to_vec());

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .body(byte_stream)
            .send()
            .await
            .map_err(|e| PipelineError::StorageUnavailable(e.to_string()))?;

        Ok(full_key)
    }

    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        let full_key = self.full_key(key);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("NoSuchKey") {
                    PipelineError::NotFound(full_key.clone())
                } else {
                    PipelineError::StorageUnavailable(e.to_string())
                }
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| PipelineError::StorageUnavailable(e.to_string()))?;

        Ok(bytes.to_vec())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let full_key = self.full_key(key);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .send()
            .await
            .map_err(|e| PipelineError::StorageUnavailable(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s3_config_default() {
        let config = S3Config::default();
        assert_eq!(config.bucket, "presence-videos");
        assert_eq!(config.region, "us-west-2");
    }

    #[test]
    fn test_payload_ceiling() {
        assert!(check_payload_size(0).is_ok());
        assert!(check_payload_size(MAX_UPLOAD_BYTES).is_ok());

        let err = check_payload_size(MAX_UPLOAD_BYTES + 1).unwrap_err();
        match err {
            PipelineError::PayloadTooLarge { size, max } => {
                assert_eq!(size, MAX_UPLOAD_BYTES + 1);
                assert_eq!(max, MAX_UPLOAD_BYTES);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_full_key_with_prefix() {
        let storage = S3ObjectStore {
            client: Client::from_conf(
                aws_sdk_s3::Config::builder()
                    .behavior_version_latest()
                    .build(),
            ),
            bucket: "presence-videos".to_string(),
            prefix: "uploads/".to_string(),
        };

        assert_eq!(storage.full_key("vid_1.mp4"), "uploads/vid_1.mp4");
    }
}
