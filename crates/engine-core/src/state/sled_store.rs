use crate::{
    error::StateStoreError,
    state::{DeadLetterStore, TenantDirectory, WatermarkStore, models::DeadLetter},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::{
    core::identifiers::{ClientCode, EntityName},
    tenants::{Tenant, TenantFilter},
};
use serde::{Serialize, de::DeserializeOwned};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::path::Path;

const TENANT_PREFIX: &str = "tenant:";
const DEAD_LETTER_PREFIX: &str = "dlq:";

/// Embedded state: tenants (with their watermarks) and the dead-letter log.
#[derive(Clone)]
pub struct SledStateStore {
    db: sled::Db,
}

impl SledStateStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StateStoreError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Throwaway store, used by tests and dry runs.
    pub fn temporary() -> Result<Self, StateStoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    #[inline]
    fn tenant_key(code: &str) -> String {
        format!("{TENANT_PREFIX}{code}")
    }

    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StateStoreError> {
        bincode::serialize(value).map_err(|e| StateStoreError::Serialization(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StateStoreError> {
        bincode::deserialize(bytes).map_err(|e| StateStoreError::Serialization(e.to_string()))
    }

    /// Inserts the tenant or updates its status, keeping existing watermarks.
    pub async fn upsert_tenant(&self, tenant: &Tenant) -> Result<(), StateStoreError> {
        let key = Self::tenant_key(tenant.code.as_str());
        let merged = match self.db.get(&key)? {
            Some(bytes) => {
                let mut existing: Tenant = Self::decode(&bytes)?;
                existing.status = tenant.status;
                for (entity, ts) in &tenant.watermarks {
                    let slot = existing.watermarks.entry(entity.clone()).or_insert(*ts);
                    if *ts > *slot {
                        *slot = *ts;
                    }
                }
                existing
            }
            None => tenant.clone(),
        };

        self.db.insert(key, Self::encode(&merged)?)?;
        self.db.flush_async().await?;
        Ok(())
    }

    pub async fn get_tenant(&self, code: &ClientCode) -> Result<Option<Tenant>, StateStoreError> {
        match self.db.get(Self::tenant_key(code.as_str()))? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Every stored tenant, inactive ones included, ordered by code.
    pub async fn all_tenants(&self) -> Result<Vec<Tenant>, StateStoreError> {
        self.db
            .scan_prefix(TENANT_PREFIX)
            .map(|item| {
                let (_key, value) = item?;
                Self::decode(&value)
            })
            .collect()
    }
}

#[async_trait]
impl TenantDirectory for SledStateStore {
    async fn list(&self, filter: &TenantFilter) -> Result<Vec<Tenant>, StateStoreError> {
        if let Some(code) = &filter.code {
            let tenant = self.get_tenant(code).await?;
            return Ok(tenant.into_iter().filter(|t| filter.matches(t)).collect());
        }

        let mut tenants = Vec::new();
        for item in self.db.scan_prefix(TENANT_PREFIX) {
            let (_key, value) = item?;
            let tenant: Tenant = Self::decode(&value)?;
            if filter.matches(&tenant) {
                tenants.push(tenant);
            }
        }
        Ok(tenants)
    }
}

#[async_trait]
impl WatermarkStore for SledStateStore {
    async fn load(
        &self,
        client: &ClientCode,
        entity: &EntityName,
    ) -> Result<Option<DateTime<Utc>>, StateStoreError> {
        Ok(self
            .get_tenant(client)
            .await?
            .and_then(|t| t.watermark(entity)))
    }

    async fn advance(
        &self,
        client: &ClientCode,
        entity: &EntityName,
        to: DateTime<Utc>,
    ) -> Result<bool, StateStoreError> {
        let key = Self::tenant_key(client.as_str());

        // Check-then-set inside a transaction so concurrent runs cannot
        // move a watermark backwards.
        let result = self.db.transaction::<_, _, StateStoreError>(|tx_db| {
            let bytes = tx_db.get(&key)?.ok_or_else(|| {
                ConflictableTransactionError::Abort(StateStoreError::TenantNotFound(
                    client.to_string(),
                ))
            })?;
            let mut tenant: Tenant =
                Self::decode(&bytes).map_err(ConflictableTransactionError::Abort)?;

            if tenant.watermark(entity).is_some_and(|current| current >= to) {
                return Ok(false);
            }

            tenant.watermarks.insert(entity.to_string(), to);
            let encoded = Self::encode(&tenant).map_err(ConflictableTransactionError::Abort)?;
            tx_db.insert(key.as_bytes(), encoded)?;
            Ok(true)
        });

        let advanced = match result {
            Ok(advanced) => advanced,
            Err(TransactionError::Abort(e)) => return Err(e),
            Err(TransactionError::Storage(e)) => return Err(e.into()),
        };

        if advanced {
            self.db.flush_async().await?;
        }
        Ok(advanced)
    }
}

#[async_trait]
impl DeadLetterStore for SledStateStore {
    async fn append(&self, letter: &DeadLetter) -> Result<(), StateStoreError> {
        let seq = self.db.generate_id()?;
        let key = format!("{DEAD_LETTER_PREFIX}{seq:020}");
        self.db.insert(key, Self::encode(letter)?)?;
        self.db.flush_async().await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<DeadLetter>, StateStoreError> {
        let mut letters = Vec::new();
        for item in self.db.scan_prefix(DEAD_LETTER_PREFIX) {
            let (_key, value) = item?;
            letters.push(Self::decode(&value)?);
        }
        Ok(letters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use model::tenants::TenantStatus;
    use tempfile::tempdir;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn lists_only_active_tenants() {
        let dir = tempdir().unwrap();
        let store = SledStateStore::open(dir.path()).unwrap();

        let mut inactive = Tenant::active("beta");
        inactive.status = TenantStatus::Inactive;
        store.upsert_tenant(&Tenant::active("alpha")).await.unwrap();
        store.upsert_tenant(&inactive).await.unwrap();
        store.upsert_tenant(&Tenant::active("gamma")).await.unwrap();

        let all = TenantDirectory::list(&store, &TenantFilter::all()).await.unwrap();
        let codes: Vec<_> = all.iter().map(|t| t.code.to_string()).collect();
        assert_eq!(codes, vec!["alpha", "gamma"]);

        let one = TenantDirectory::list(&store, &TenantFilter::code("beta"))
            .await
            .unwrap();
        assert!(one.is_empty());

        assert_eq!(store.all_tenants().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn watermark_only_moves_forward() {
        let store = SledStateStore::temporary().unwrap();
        store.upsert_tenant(&Tenant::active("c1")).await.unwrap();
        let client = ClientCode::from("c1");
        let entity = EntityName::new("order");

        assert_eq!(store.load(&client, &entity).await.unwrap(), None);
        assert!(store.advance(&client, &entity, ts(10)).await.unwrap());
        assert!(!store.advance(&client, &entity, ts(5)).await.unwrap());
        assert!(!store.advance(&client, &entity, ts(10)).await.unwrap());
        assert_eq!(store.load(&client, &entity).await.unwrap(), Some(ts(10)));
    }

    #[tokio::test]
    async fn advance_unknown_tenant_fails() {
        let store = SledStateStore::temporary().unwrap();
        let err = store
            .advance(&ClientCode::from("ghost"), &EntityName::new("order"), ts(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StateStoreError::TenantNotFound(code) if code == "ghost"));
    }

    #[tokio::test]
    async fn upsert_keeps_watermarks() {
        let store = SledStateStore::temporary().unwrap();
        let client = ClientCode::from("c1");
        let entity = EntityName::new("product");
        store.upsert_tenant(&Tenant::active("c1")).await.unwrap();
        store.advance(&client, &entity, ts(3)).await.unwrap();

        let mut deactivated = Tenant::active("c1");
        deactivated.status = TenantStatus::Inactive;
        store.upsert_tenant(&deactivated).await.unwrap();

        let stored = store.get_tenant(&client).await.unwrap().unwrap();
        assert!(!stored.is_active());
        assert_eq!(stored.watermark(&entity), Some(ts(3)));
    }

    #[tokio::test]
    async fn dead_letters_keep_insertion_order() {
        let store = SledStateStore::temporary().unwrap();
        for id in ["m1", "m2", "m3"] {
            store
                .append(&DeadLetter {
                    message_id: id.into(),
                    client_code: "c1".into(),
                    body: "{}".into(),
                    receive_count: 2,
                    error: "boom".into(),
                    failed_at: ts(1),
                })
                .await
                .unwrap();
        }
        let ids: Vec<_> = DeadLetterStore::list(&store)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.message_id)
            .collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);
    }
}
