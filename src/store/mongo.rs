//! MongoDB-backed key store.
//!
//! One document per service, keyed by `_id = <service name>`:
//!
//! ```json
//! { "_id": "billing", "api_key": "...", "expires_at": ISODate(...), "updated_at": ISODate(...) }
//! ```
//!
//! `set` is a single `replaceOne` with `upsert: true` on `_id`, so a rotation
//! is atomic per service and concurrent writers resolve last-write-wins.

use async_trait::async_trait;
use bson::{DateTime as BsonDateTime, Document, doc};
use mongodb::options::{ClientOptions, Credential};
use mongodb::{Client, Collection};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{KeyStore, ServiceIdentity, StoreError, StoreResult};
use crate::config::Config;

#[derive(Debug, Serialize, Deserialize)]
struct ServiceKeyDoc {
    #[serde(rename = "_id")]
    service: String,
    api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<BsonDateTime>,
    updated_at: BsonDateTime,
}

impl From<ServiceIdentity> for ServiceKeyDoc {
    fn from(identity: ServiceIdentity) -> Self {
        Self {
            service: identity.name,
            api_key: identity.api_key.expose().to_string(),
            expires_at: identity.expires_at.map(BsonDateTime::from_chrono),
            updated_at: BsonDateTime::now(),
        }
    }
}

impl From<ServiceKeyDoc> for ServiceIdentity {
    fn from(doc: ServiceKeyDoc) -> Self {
        ServiceIdentity::new(doc.service, doc.api_key)
            .with_expiry(doc.expires_at.map(BsonDateTime::to_chrono))
    }
}

#[derive(Clone)]
pub struct MongoKeyStore {
    client: Client,
    db_name: String,
    keys: Collection<ServiceKeyDoc>,
}

impl MongoKeyStore {
    /// Build a client from config. The driver connects lazily; call
    /// [`KeyStore::ping`] to verify reachability.
    pub async fn connect(config: &Config) -> StoreResult<Self> {
        let mut options = ClientOptions::parse(&config.store_uri)
            .await
            .map_err(|e| StoreError::Unavailable(format!("invalid STORE_URI: {e}")))?;

        options.app_name = Some(config.service_name.clone());
        options.connect_timeout = Some(config.store_connect_timeout);
        options.server_selection_timeout = Some(config.store_timeout);

        if let Some(password) = &config.store_password {
            options.credential = Some(
                Credential::builder()
                    .username(config.store_username.clone())
                    .password(password.clone())
                    .build(),
            );
        }

        let client = Client::with_options(options)
            .map_err(|e| StoreError::Unavailable(format!("failed to create client: {e}")))?;

        info!(
            database = %config.store_database,
            collection = %config.store_collection,
            "MongoDB key store configured"
        );

        Ok(Self::from_client(
            client,
            &config.store_database,
            &config.store_collection,
        ))
    }

    pub fn from_client(client: Client, db_name: &str, collection: &str) -> Self {
        let keys = client.database(db_name).collection(collection);
        Self {
            client,
            db_name: db_name.to_string(),
            keys,
        }
    }
}

fn unavailable(e: mongodb::error::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[async_trait]
impl KeyStore for MongoKeyStore {
    #[instrument(skip(self))]
    async fn get(&self, service: &str) -> StoreResult<Option<ServiceIdentity>> {
        let found = self
            .keys
            .find_one(doc! { "_id": service })
            .await
            .map_err(|e| {
                if let mongodb::error::ErrorKind::BsonDeserialization(de) = e.kind.as_ref() {
                    return StoreError::Corrupt {
                        service: service.to_string(),
                        reason: de.to_string(),
                    };
                }
                unavailable(e)
            })?;

        Ok(found.map(ServiceIdentity::from))
    }

    #[instrument(skip(self, identity), fields(service = %identity.name))]
    async fn set(&self, identity: ServiceIdentity) -> StoreResult<()> {
        let filter = doc! { "_id": identity.name.as_str() };
        let record = ServiceKeyDoc::from(identity);

        self.keys
            .replace_one(filter, &record)
            .upsert(true)
            .await
            .map_err(unavailable)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn exists(&self, service: &str) -> StoreResult<bool> {
        let count = self
            .keys
            .count_documents(doc! { "_id": service })
            .limit(1)
            .await
            .map_err(unavailable)?;

        Ok(count > 0)
    }

    async fn ping(&self) -> StoreResult<()> {
        let _: Document = self
            .client
            .database(&self.db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_doc_roundtrip_keeps_expiry() {
        let expires = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let identity = ServiceIdentity::new("billing", "abc").with_expiry(Some(expires));

        let doc = ServiceKeyDoc::from(identity);
        assert_eq!(doc.service, "billing");
        assert_eq!(doc.api_key, "abc");

        let back = ServiceIdentity::from(doc);
        assert_eq!(back.name, "billing");
        assert!(back.api_key.matches("abc"));
        assert_eq!(back.expires_at, Some(expires));
    }

    #[test]
    fn test_doc_serializes_service_as_id() {
        let doc = ServiceKeyDoc::from(ServiceIdentity::new("auth", "k"));
        let bson = bson::to_document(&doc).unwrap();

        assert_eq!(bson.get_str("_id").unwrap(), "auth");
        assert!(!bson.contains_key("expires_at"));
        assert!(bson.contains_key("updated_at"));
    }
}
