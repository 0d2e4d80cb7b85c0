//! Object storage gateway: time-limited presigned URLs for paper files.

pub mod memory;
pub mod s3;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

pub use memory::MemoryPresigner;
pub use s3::S3Presigner;

/// Lifetime of every presigned URL handed out by the API.
pub const PRESIGN_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Upload,
    Download,
}

impl Operation {
    pub fn http_method(&self) -> &'static str {
        match self {
            Operation::Upload => "PUT",
            Operation::Download => "GET",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUrl {
    pub url: String,
    pub method: &'static str,
    pub key: String,
    pub expires_in: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum PresignError {
    #[error("invalid presigning config: {0}")]
    Config(String),
    #[error("presign request failed: {0}")]
    Request(String),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Grant exactly `operation` on `key` for `ttl`. Expiry is enforced by the
    /// object store, not here.
    async fn presign(
        &self,
        operation: Operation,
        key: &str,
        ttl: Duration,
    ) -> Result<PresignedUrl, PresignError>;
}
