use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{item_key, Filter, Item, ItemStore, ReturnMode, StorageError, KEY_ATTRIBUTE};

/// Process-local tables. Used by tests and by `STORAGE_BACKEND=memory`.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, BTreeMap<String, Item>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_table<T>(&self, table: &str, f: impl FnOnce(&mut BTreeMap<String, Item>) -> T) -> T {
        let mut tables = self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(tables.entry(table.to_string()).or_default())
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn put(&self, table: &str, item: Item) -> Result<(), StorageError> {
        let key = item_key(&item)?.to_string();
        self.with_table(table, |rows| rows.insert(key, item));
        Ok(())
    }

    async fn insert(&self, table: &str, item: Item) -> Result<(), StorageError> {
        let key = item_key(&item)?.to_string();
        self.with_table(table, |rows| match rows.entry(key) {
            Entry::Occupied(taken) => Err(StorageError::AlreadyExists(taken.key().clone())),
            Entry::Vacant(slot) => {
                slot.insert(item);
                Ok(())
            }
        })
    }

    async fn get(&self, table: &str, key: &str) -> Result<Option<Item>, StorageError> {
        Ok(self.with_table(table, |rows| rows.get(key).cloned()))
    }

    async fn update(
        &self,
        table: &str,
        key: &str,
        fields: Item,
        mode: ReturnMode,
    ) -> Result<Option<Item>, StorageError> {
        self.with_table(table, |rows| -> Result<Option<Item>, StorageError> {
            let row = rows
                .get_mut(key)
                .ok_or_else(|| StorageError::ConditionFailed(key.to_string()))?;
            for (name, value) in fields {
                if name != KEY_ATTRIBUTE {
                    row.insert(name, value);
                }
            }
            Ok(match mode {
                ReturnMode::Nothing => None,
                ReturnMode::AllNew => Some(row.clone()),
            })
        })
    }

    async fn query(&self, table: &str, filter: &Filter) -> Result<Vec<Item>, StorageError> {
        Ok(self.with_table(table, |rows| {
            rows.values().filter(|item| filter.matches(item)).cloned().collect()
        }))
    }
}
