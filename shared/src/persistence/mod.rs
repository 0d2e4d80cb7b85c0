//! Persistence gateway: put/get/update/query against a document store.
//!
//! Records are JSON objects keyed by their `id` field. Handlers only ever talk
//! to the [`ItemStore`] trait, so the DynamoDB client and the in-memory tables
//! used by tests are interchangeable.

pub mod attributes;
pub mod dynamo;
pub mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};

pub use dynamo::DynamoStore;
pub use memory::MemoryStore;

/// Name of the identifier attribute every table is keyed by.
pub const KEY_ATTRIBUTE: &str = "id";

pub type Item = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage request failed: {0}")]
    Transport(String),
    #[error("no record with id {0}")]
    ConditionFailed(String),
    #[error("a record with id {0} already exists")]
    AlreadyExists(String),
    #[error("item is missing a string `id` attribute")]
    MissingKey,
    #[error("could not decode stored attribute `{0}`")]
    Decode(String),
}

/// Whether `update` hands back the record after the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnMode {
    Nothing,
    AllNew,
}

/// Equality conditions a record must satisfy to be returned by `query`.
/// An empty filter matches every record.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, item: &Item) -> bool {
        self.conditions
            .iter()
            .all(|(field, value)| item.get(field) == Some(value))
    }
}

#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Insert or overwrite the record keyed by `item["id"]`.
    async fn put(&self, table: &str, item: Item) -> Result<(), StorageError>;

    /// Write a record that must not exist yet. Fails with
    /// [`StorageError::AlreadyExists`] and leaves the stored record untouched.
    async fn insert(&self, table: &str, item: Item) -> Result<(), StorageError>;

    /// `Ok(None)` when no record exists; absence is not an error.
    async fn get(&self, table: &str, key: &str) -> Result<Option<Item>, StorageError>;

    /// Apply `fields` to an existing record. Fails with
    /// [`StorageError::ConditionFailed`] when `key` is absent.
    async fn update(
        &self,
        table: &str,
        key: &str,
        fields: Item,
        mode: ReturnMode,
    ) -> Result<Option<Item>, StorageError>;

    async fn query(&self, table: &str, filter: &Filter) -> Result<Vec<Item>, StorageError>;
}

pub(crate) fn item_key(item: &Item) -> Result<&str, StorageError> {
    item.get(KEY_ATTRIBUTE)
        .and_then(Value::as_str)
        .ok_or(StorageError::MissingKey)
}

/// Serialize a typed record into a storable item.
pub fn to_item<T: serde::Serialize>(record: &T) -> Result<Item, serde_json::Error> {
    serde_json::from_value(serde_json::to_value(record)?)
}

pub fn from_item<T: serde::de::DeserializeOwned>(item: Item) -> Result<T, serde_json::Error> {
    serde_json::from_value(Value::Object(item))
}
