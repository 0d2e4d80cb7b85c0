pub mod config;
pub mod errors;
pub mod objects;
pub mod papers;
pub mod persistence;
pub mod responses;
pub mod types;
pub mod users;

use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_s3::Client as S3Client;
use std::sync::Arc;

use config::{Config, StorageBackend};
use objects::{MemoryPresigner, ObjectStore, S3Presigner};
use persistence::{DynamoStore, ItemStore, MemoryStore};

/// Shared application state
pub struct AppState {
    pub store: Arc<dyn ItemStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub config: Config,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ItemStore>,
        objects: Arc<dyn ObjectStore>,
        config: Config,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            objects,
            config,
        })
    }

    /// Build the gateways selected by `config.backend`.
    pub async fn from_config(config: Config) -> Arc<Self> {
        match config.backend {
            StorageBackend::Aws => {
                let aws = aws_config::load_from_env().await;
                let store = Arc::new(DynamoStore::new(DynamoClient::new(&aws)));
                let objects = Arc::new(S3Presigner::new(S3Client::new(&aws), config.bucket.clone()));
                Self::new(store, objects, config)
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; records vanish with the process");
                let objects = Arc::new(MemoryPresigner::new(config.bucket.clone()));
                Self::new(Arc::new(MemoryStore::new()), objects, config)
            }
        }
    }
}
