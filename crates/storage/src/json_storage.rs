//! JSON file storage implementation.
//!
//! Stores each namespace as one flat JSON object of `<namespace>:<key>` pairs
//! and keeps a small per-namespace meta marker (version + updated_at). A commit
//! writes the whole document to a temporary file and renames it into place, so
//! a failed write never leaves a namespace half-updated.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use ritual_core::{Mode, Namespace};
use serde_json::Value;
use tokio::fs;
use super::{NamespaceLocks, Result, Storage, Transaction};

/// File-based JSON storage backend.
pub struct JsonStorage {
    root: PathBuf,
    locks: NamespaceLocks,
}

impl JsonStorage {
    /// Create storage rooted at `root`, creating the directories it needs.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        for mode in [Mode::Solo, Mode::Couple] {
            fs::create_dir_all(root.join("namespaces").join(mode.as_str())).await?;
            fs::create_dir_all(root.join("meta").join(mode.as_str())).await?;
        }

        Ok(Self {
            root,
            locks: NamespaceLocks::new(),
        })
    }

    fn namespace_path(&self, namespace: &Namespace) -> PathBuf {
        self.root
            .join("namespaces")
            .join(namespace.mode().as_str())
            .join(format!("{}.json", file_stem(namespace.id())))
    }

    fn meta_path(&self, namespace: &Namespace) -> PathBuf {
        self.root
            .join("meta")
            .join(namespace.mode().as_str())
            .join(format!("{}.meta.json", file_stem(namespace.id())))
    }

    /// Read the namespace document, keyed by fully qualified key.
    async fn read_document(&self, namespace: &Namespace) -> Result<BTreeMap<String, Value>> {
        Ok(read_json(&self.namespace_path(namespace))
            .await?
            .unwrap_or_default())
    }

    /// Read and increment the namespace version, return the new version.
    async fn bump_version(&self, namespace: &Namespace) -> Result<u64> {
        let path = self.meta_path(namespace);
        let version = read_json::<Value>(&path)
            .await
            .ok()
            .flatten()
            .and_then(|json| json.get("version").and_then(|v| v.as_u64()))
            .unwrap_or(0)
            + 1;
        let meta = serde_json::json!({
            "namespace": namespace.to_string(),
            "version": version,
            "updated_at": chrono::Utc::now(),
        });
        fs::write(&path, serde_json::to_string_pretty(&meta)?.as_bytes()).await?;
        Ok(version)
    }
}

#[async_trait::async_trait]
impl Storage for JsonStorage {
    async fn begin(&self, namespace: &Namespace) -> Result<Transaction> {
        let guard = self.locks.acquire(namespace).await;
        let snapshot = self
            .read_document(namespace)
            .await?
            .into_iter()
            .filter_map(|(key, value)| namespace.strip(&key).map(|k| (k.to_string(), value)))
            .collect();
        Ok(Transaction::new(namespace.clone(), snapshot, guard))
    }

    async fn commit(&self, txn: Transaction) -> Result<()> {
        let parts = txn.into_parts();
        if parts.writes.is_empty() {
            return Ok(());
        }
        let namespace = parts.namespace;

        let mut document = self.read_document(&namespace).await?;
        for (key, value) in parts.writes {
            let full_key = namespace.key(&key);
            match value {
                Some(value) => {
                    document.insert(full_key, value);
                }
                None => {
                    document.remove(&full_key);
                }
            }
        }

        let path = self.namespace_path(&namespace);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&document)?;
        fs::write(&tmp, json.as_bytes()).await?;
        fs::rename(&tmp, &path).await?;

        // The document is durable at this point; the meta marker is advisory.
        match self.bump_version(&namespace).await {
            Ok(version) => tracing::debug!("Committed {} (version {})", namespace, version),
            Err(e) => tracing::warn!("Failed to update meta marker for {}: {}", namespace, e),
        }

        drop(parts.guard);
        Ok(())
    }
}

/// File-system-safe rendering of an identity.
///
/// ASCII alphanumerics and `-` are kept; every other byte becomes `_xx` (hex),
/// so distinct identities never share a file.
fn file_stem(id: &str) -> String {
    let mut stem = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("_{:02x}", byte));
        }
    }
    stem
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
