use std::time::Duration;

use async_trait::async_trait;

use super::{ObjectStore, Operation, PresignError, PresignedUrl};

/// Hands out deterministic `memory://` URLs instead of talking to S3.
pub struct MemoryPresigner {
    bucket: String,
    fail: bool,
}

impl MemoryPresigner {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            fail: false,
        }
    }

    /// A presigner whose every call fails, for exercising error paths.
    pub fn failing() -> Self {
        Self {
            bucket: String::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryPresigner {
    async fn presign(
        &self,
        operation: Operation,
        key: &str,
        ttl: Duration,
    ) -> Result<PresignedUrl, PresignError> {
        if self.fail {
            return Err(PresignError::Request(format!("presigning disabled for {}", key)));
        }

        let url = format!(
            "memory://{}/{}?method={}&expires={}",
            self.bucket,
            key,
            operation.http_method(),
            ttl.as_secs()
        );

        Ok(PresignedUrl {
            url,
            method: operation.http_method(),
            key: key.to_string(),
            expires_in: ttl.as_secs(),
        })
    }
}
