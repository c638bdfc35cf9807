//! In-process key store.
//!
//! Same contract as the MongoDB store, without durability or sharing between
//! instances. Used by tests and for local development (`STORE_URI=memory://`).

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use super::{KeyStore, ServiceIdentity, StoreResult};

#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    keys: RwLock<HashMap<String, ServiceIdentity>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered services.
    pub async fn len(&self) -> usize {
        self.keys.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.keys.read().await.is_empty()
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn get(&self, service: &str) -> StoreResult<Option<ServiceIdentity>> {
        Ok(self.keys.read().await.get(service).cloned())
    }

    async fn set(&self, identity: ServiceIdentity) -> StoreResult<()> {
        info!(service = %identity.name, "Storing service key");
        self.keys
            .write()
            .await
            .insert(identity.name.clone(), identity);
        Ok(())
    }

    async fn exists(&self, service: &str) -> StoreResult<bool> {
        Ok(self.keys.read().await.contains_key(service))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_overwrites() {
        let store = MemoryKeyStore::new();
        store.set(ServiceIdentity::new("billing", "v1")).await.unwrap();
        store.set(ServiceIdentity::new("billing", "v2")).await.unwrap();

        let current = store.get("billing").await.unwrap().unwrap();
        assert!(current.api_key.matches("v2"));
        assert!(!current.api_key.matches("v1"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_exists_and_missing() {
        let store = MemoryKeyStore::new();
        assert!(store.is_empty().await);
        assert!(!store.exists("auth").await.unwrap());
        assert!(store.get("auth").await.unwrap().is_none());

        store.set(ServiceIdentity::new("auth", "k")).await.unwrap();
        assert!(store.exists("auth").await.unwrap());
    }
}
