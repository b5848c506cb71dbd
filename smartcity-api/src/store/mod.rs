//! Remote state store capability.
//!
//! The dashboard only relies on whole-subtree reads and writes, per-field
//! updates, deletes and change watches. Watches fire for every mutation of the
//! watched path, including the ones this process made, and always carry a fresh
//! read of the whole watched value.

mod firebase;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

pub use firebase::FirebaseStore;
pub use memory::MemoryStore;

pub type WatchId = u64;

/// Live subscription to one path. Dropping the receiver ends it as well.
#[derive(Debug)]
pub struct Watch {
    pub id: WatchId,
    pub receiver: mpsc::UnboundedReceiver<Option<Value>>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Permission denied for `{0}`")]
    PermissionDenied(String),

    #[error("Store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Store answered {status} for `{path}`")]
    Status { status: u16, path: String },

    #[error("Invalid store document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Watch on `{0}` closed")]
    WatchClosed(String),
}

impl StoreError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, StoreError::PermissionDenied(_))
    }
}

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Current value at `path`, `None` when nothing is stored there.
    async fn read(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Replaces the whole subtree at `path`.
    async fn write_whole(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Sets the given children of `path`, leaving siblings untouched.
    async fn write_field(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError>;

    async fn remove(&self, path: &str) -> Result<(), StoreError>;

    /// Subscribes to `path`. The current value is delivered first.
    async fn watch(&self, path: &str) -> Result<Watch, StoreError>;

    async fn unwatch(&self, id: WatchId);
}

pub async fn read_as<T: DeserializeOwned>(
    store: &dyn StateStore,
    path: &str,
) -> Result<Option<T>, StoreError> {
    match store.read(path).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local tree, nothing survives a restart
    Memory,
    /// Firebase Realtime Database over its REST interface
    Firebase {
        url: String,
        #[serde(default)]
        auth: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_root")]
    pub root: String,
    #[serde(flatten)]
    pub backend: StoreBackend,
}

fn default_root() -> String {
    "smartcity".to_string()
}

pub fn connect(config: &StoreConfig) -> Result<Arc<dyn StateStore>, StoreError> {
    Ok(match &config.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::Firebase { url, auth } => Arc::new(FirebaseStore::new(url, auth.clone())?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_from_toml_shape() {
        let config: StoreConfig = serde_json::from_value(serde_json::json!({
            "type": "firebase",
            "url": "https://example.firebaseio.com",
            "root": "city"
        }))
        .unwrap();

        assert_eq!(config.root, "city");
        assert!(matches!(
            config.backend,
            StoreBackend::Firebase { ref url, auth: None } if url == "https://example.firebaseio.com"
        ));

        let config: StoreConfig = serde_json::from_value(serde_json::json!({ "type": "memory" })).unwrap();
        assert_eq!(config.root, "smartcity");
    }
}
