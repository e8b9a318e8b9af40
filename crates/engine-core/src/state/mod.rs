use crate::error::StateStoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::{
    core::identifiers::{ClientCode, EntityName},
    tenants::{Tenant, TenantFilter},
};

pub mod models;
pub mod sled_store;

pub use models::DeadLetter;
pub use sled_store::SledStateStore;

/// Read side of the tenant directory.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Active tenants matching the filter, ordered by code.
    async fn list(&self, filter: &TenantFilter) -> Result<Vec<Tenant>, StateStoreError>;
}

/// Per tenant and entity `lastIncrementalLoadDate`.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    async fn load(
        &self,
        client: &ClientCode,
        entity: &EntityName,
    ) -> Result<Option<DateTime<Utc>>, StateStoreError>;

    /// Moves the watermark forward. Returns `false` when the stored value is
    /// already at or past `to`; watermarks never go back.
    async fn advance(
        &self,
        client: &ClientCode,
        entity: &EntityName,
        to: DateTime<Utc>,
    ) -> Result<bool, StateStoreError>;
}

/// Messages that exhausted their deliveries.
#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    async fn append(&self, letter: &DeadLetter) -> Result<(), StateStoreError>;
    async fn list(&self) -> Result<Vec<DeadLetter>, StateStoreError>;
}
