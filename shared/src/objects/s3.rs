use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client as S3Client;

use super::{ObjectStore, Operation, PresignError, PresignedUrl};

/// Presigns PUT/GET requests against a single bucket.
pub struct S3Presigner {
    client: S3Client,
    bucket: String,
}

impl S3Presigner {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Presigner {
    async fn presign(
        &self,
        operation: Operation,
        key: &str,
        ttl: Duration,
    ) -> Result<PresignedUrl, PresignError> {
        let config =
            PresigningConfig::expires_in(ttl).map_err(|e| PresignError::Config(e.to_string()))?;

        let presigned = match operation {
            Operation::Upload => self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .presigned(config)
                .await
                .map_err(|e| PresignError::Request(DisplayErrorContext(&e).to_string()))?,
            Operation::Download => self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .presigned(config)
                .await
                .map_err(|e| PresignError::Request(DisplayErrorContext(&e).to_string()))?,
        };

        tracing::debug!("Presigned {} for s3://{}/{}", operation.http_method(), self.bucket, key);

        Ok(PresignedUrl {
            url: presigned.uri().to_string(),
            method: operation.http_method(),
            key: key.to_string(),
            expires_in: ttl.as_secs(),
        })
    }
}
