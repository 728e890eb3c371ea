//! In-memory storage backend.

use async_trait::async_trait;
use ritual_core::Namespace;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use super::{NamespaceLocks, Result, Storage, Transaction};

/// Process-local storage. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStorage {
    data: RwLock<HashMap<Namespace, BTreeMap<String, Value>>>,
    locks: NamespaceLocks,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// All persisted entries of a namespace, keyed by fully qualified key.
    pub async fn dump(&self, namespace: &Namespace) -> BTreeMap<String, Value> {
        self.data
            .read()
            .await
            .get(namespace)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(k, v)| (namespace.key(k), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn begin(&self, namespace: &Namespace) -> Result<Transaction> {
        let guard = self.locks.acquire(namespace).await;
        let snapshot = self
            .data
            .read()
            .await
            .get(namespace)
            .cloned()
            .unwrap_or_default();
        Ok(Transaction::new(namespace.clone(), snapshot, guard))
    }

    async fn commit(&self, txn: Transaction) -> Result<()> {
        let parts = txn.into_parts();
        if parts.writes.is_empty() {
            return Ok(());
        }

        let mut data = self.data.write().await;
        let entries = data.entry(parts.namespace.clone()).or_default();
        for (key, value) in parts.writes {
            match value {
                Some(value) => {
                    entries.insert(key, value);
                }
                None => {
                    entries.remove(&key);
                }
            }
        }
        tracing::debug!("Committed transaction on {}", parts.namespace);
        drop(parts.guard);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{StorageError, StorageExt};
    use serde_json::json;

    #[tokio::test]
    async fn test_get_set_remove() {
        let storage = MemoryStorage::new();
        let ns = Namespace::solo("u1");

        assert!(storage.get(&ns, "dayCount").await.unwrap().is_none());
        storage.set(&ns, "dayCount", json!(2)).await.unwrap();
        assert_eq!(storage.get(&ns, "dayCount").await.unwrap(), Some(json!(2)));

        storage.remove(&ns, "dayCount").await.unwrap();
        assert!(storage.get(&ns, "dayCount").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let storage = MemoryStorage::new();
        storage.set(&Namespace::solo("u1"), "dayCount", json!(5)).await.unwrap();

        assert!(storage
            .get(&Namespace::couple("u1"), "dayCount")
            .await
            .unwrap()
            .is_none());
        let dump = storage.dump(&Namespace::solo("u1")).await;
        assert_eq!(dump.get("solo:u1:dayCount"), Some(&json!(5)));
    }

    #[tokio::test]
    async fn test_failed_transaction_discards_writes() {
        let storage = MemoryStorage::new();
        let ns = Namespace::solo("u1");

        let result: std::result::Result<(), StorageError> = storage
            .transaction(&ns, |txn| {
                txn.set("dayCount", &2)?;
                txn.set("missionDay2", "text")?;
                Err(StorageError::Other("boom".into()))
            })
            .await;
        assert!(result.is_err());
        assert!(storage.dump(&ns).await.is_empty());

        storage
            .transaction(&ns, |txn| -> crate::Result<()> {
                txn.set("dayCount", &2)?;
                txn.set("missionDay2", "text")?;
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(storage.dump(&ns).await.len(), 2);
    }
}
