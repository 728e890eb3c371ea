//! Storage trait abstraction.

use async_trait::async_trait;
use ritual_core::Namespace;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Stored value does not match the expected shape
    #[error("Corrupt value at {key}: {reason}")]
    Corrupt {
        /// Fully qualified key
        key: String,
        /// What was wrong
        reason: String,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Namespaced key-value storage with atomic transactions.
///
/// Keys passed to a [`Transaction`] are relative to its namespace; backends
/// persist them as `<namespace>:<key>`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Start a transaction. Holds the namespace's writer lock until the
    /// transaction is committed or dropped.
    async fn begin(&self, namespace: &Namespace) -> Result<Transaction>;

    /// Apply every write of the transaction, all or nothing.
    async fn commit(&self, txn: Transaction) -> Result<()>;

    /// Discard a transaction.
    async fn rollback(&self, txn: Transaction) -> Result<()> {
        tracing::debug!("Rolled back transaction on {}", txn.namespace());
        Ok(())
    }

    /// Read a single value.
    async fn get(&self, namespace: &Namespace, key: &str) -> Result<Option<Value>> {
        let txn = self.begin(namespace).await?;
        Ok(txn.get_raw(key).cloned())
    }

    /// Write a single value.
    async fn set(&self, namespace: &Namespace, key: &str, value: Value) -> Result<()> {
        let mut txn = self.begin(namespace).await?;
        txn.set(key, &value)?;
        self.commit(txn).await
    }

    /// Delete a single value.
    async fn remove(&self, namespace: &Namespace, key: &str) -> Result<()> {
        let mut txn = self.begin(namespace).await?;
        txn.remove(key);
        self.commit(txn).await
    }
}

/// Closure-style transactions over any [`Storage`].
#[async_trait]
pub trait StorageExt: Storage {
    /// Run a read-modify-write closure atomically.
    ///
    /// The closure sees a consistent snapshot of the namespace. Its writes are
    /// committed together if it returns `Ok`, and discarded if it returns `Err`.
    async fn transaction<F, T, E>(&self, namespace: &Namespace, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Transaction) -> std::result::Result<T, E> + Send,
        T: Send,
        E: From<StorageError> + Send;
}

#[async_trait]
impl<S: Storage + ?Sized> StorageExt for S {
    async fn transaction<F, T, E>(&self, namespace: &Namespace, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Transaction) -> std::result::Result<T, E> + Send,
        T: Send,
        E: From<StorageError> + Send,
    {
        let mut txn = self.begin(namespace).await?;
        match f(&mut txn) {
            Ok(value) => {
                if txn.is_dirty() {
                    self.commit(txn).await?;
                } else {
                    self.rollback(txn).await?;
                }
                Ok(value)
            }
            Err(e) => {
                self.rollback(txn).await?;
                Err(e)
            }
        }
    }
}

/// A consistent view of one namespace plus its buffered writes.
pub struct Transaction {
    namespace: Namespace,
    snapshot: BTreeMap<String, Value>,
    writes: BTreeMap<String, Option<Value>>,
    guard: OwnedMutexGuard<()>,
}

/// Pieces of a finished transaction handed to a backend's commit.
pub struct TransactionParts {
    /// Namespace written to
    pub namespace: Namespace,
    /// Relative key -> new value, `None` deletes
    pub writes: BTreeMap<String, Option<Value>>,
    /// Writer lock; keep it alive until the writes are durable
    pub guard: OwnedMutexGuard<()>,
}

impl Transaction {
    /// Create a transaction from a snapshot of relative keys.
    pub fn new(
        namespace: Namespace,
        snapshot: BTreeMap<String, Value>,
        guard: OwnedMutexGuard<()>,
    ) -> Self {
        Self {
            namespace,
            snapshot,
            writes: BTreeMap::new(),
            guard,
        }
    }

    /// Namespace this transaction is bound to.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Raw value visible to this transaction.
    pub fn get_raw(&self, key: &str) -> Option<&Value> {
        match self.writes.get(key) {
            Some(pending) => pending.as_ref(),
            None => self.snapshot.get(key),
        }
    }

    /// Typed value visible to this transaction.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_raw(key) {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| StorageError::Corrupt {
                    key: self.namespace.key(key),
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    /// Buffer a write. Writing the value already stored is a no-op.
    pub fn set<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        if self.snapshot.get(key) == Some(&value) {
            self.writes.remove(key);
        } else {
            self.writes.insert(key.to_string(), Some(value));
        }
        Ok(())
    }

    /// Buffer a delete.
    pub fn remove(&mut self, key: &str) {
        if self.snapshot.contains_key(key) {
            self.writes.insert(key.to_string(), None);
        } else {
            self.writes.remove(key);
        }
    }

    /// Relative keys visible to this transaction.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .snapshot
            .keys()
            .filter(|k| !matches!(self.writes.get(*k), Some(None)))
            .cloned()
            .collect();
        for (key, value) in &self.writes {
            if value.is_some() && !self.snapshot.contains_key(key) {
                keys.push(key.clone());
            }
        }
        keys.sort();
        keys
    }

    /// Whether any write is buffered.
    pub fn is_dirty(&self) -> bool {
        !self.writes.is_empty()
    }

    /// Split into the parts a backend needs to commit.
    pub fn into_parts(self) -> TransactionParts {
        TransactionParts {
            namespace: self.namespace,
            writes: self.writes,
            guard: self.guard,
        }
    }
}

/// Per-namespace writer locks shared by backends.
#[derive(Default)]
pub struct NamespaceLocks {
    locks: Mutex<HashMap<Namespace, Arc<Mutex<()>>>>,
}

impl NamespaceLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a namespace.
    pub async fn acquire(&self, namespace: &Namespace) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(namespace.clone()).or_default())
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn txn_with(entries: &[(&str, Value)]) -> Transaction {
        let locks = NamespaceLocks::new();
        let ns = Namespace::solo("t");
        let guard = locks.acquire(&ns).await;
        let snapshot = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Transaction::new(ns, snapshot, guard)
    }

    #[tokio::test]
    async fn test_set_same_value_is_not_dirty() {
        let mut txn = txn_with(&[("dayCount", serde_json::json!(3))]).await;
        txn.set("dayCount", &3u32).unwrap();
        assert!(!txn.is_dirty());
        txn.set("dayCount", &4u32).unwrap();
        assert!(txn.is_dirty());
        assert_eq!(txn.get::<u32>("dayCount").unwrap(), Some(4));
        txn.set("dayCount", &3u32).unwrap();
        assert!(!txn.is_dirty());
    }

    #[tokio::test]
    async fn test_remove_and_keys() {
        let mut txn = txn_with(&[
            ("a", serde_json::json!(1)),
            ("b", serde_json::json!(2)),
        ])
        .await;
        txn.remove("a");
        txn.remove("missing");
        txn.set("c", &3).unwrap();
        assert_eq!(txn.keys(), vec!["b".to_string(), "c".to_string()]);
        assert!(txn.get_raw("a").is_none());
    }

    #[tokio::test]
    async fn test_corrupt_value_reports_full_key() {
        let txn = txn_with(&[("dayCount", serde_json::json!("three"))]).await;
        match txn.get::<u32>("dayCount") {
            Err(StorageError::Corrupt { key, .. }) => assert_eq!(key, "solo:t:dayCount"),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_locks_serialize_same_namespace() {
        let locks = Arc::new(NamespaceLocks::new());
        let ns = Namespace::solo("x");
        let guard = locks.acquire(&ns).await;

        let other = locks.acquire(&Namespace::couple("x")).await;
        drop(other);

        let locks2 = Arc::clone(&locks);
        let ns2 = ns.clone();
        let waiter = tokio::spawn(async move {
            let _g = locks2.acquire(&ns2).await;
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.await.unwrap();
    }
}
