use crate::core::identifiers::{ClientCode, EntityName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Active,
    Inactive,
}

/// A tenant as stored in the directory, with its per-entity watermarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub code: ClientCode,
    pub status: TenantStatus,
    #[serde(default)]
    pub watermarks: BTreeMap<String, DateTime<Utc>>,
}

impl Tenant {
    pub fn active(code: &str) -> Self {
        Tenant {
            code: ClientCode::from(code),
            status: TenantStatus::Active,
            watermarks: BTreeMap::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }

    /// `lastIncrementalLoadDate` of the given entity, if it was ever synced.
    pub fn watermark(&self, entity: &EntityName) -> Option<DateTime<Utc>> {
        self.watermarks.get(entity.as_str()).copied()
    }

    pub fn client_watermarks(&self) -> impl Iterator<Item = ClientWatermark> + '_ {
        self.watermarks.iter().map(|(entity, at)| ClientWatermark {
            client_code: self.code.clone(),
            entity: EntityName::new(entity),
            last_incremental_load_date: *at,
        })
    }
}

/// Directory query: active tenants, optionally narrowed to one code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantFilter {
    pub code: Option<ClientCode>,
}

impl TenantFilter {
    pub fn all() -> Self {
        TenantFilter { code: None }
    }

    pub fn code(code: &str) -> Self {
        TenantFilter {
            code: Some(ClientCode::from(code)),
        }
    }

    pub fn matches(&self, tenant: &Tenant) -> bool {
        tenant.is_active() && self.code.as_ref().is_none_or(|code| *code == tenant.code)
    }
}

/// Last synced point in time of one entity for one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientWatermark {
    pub client_code: ClientCode,
    pub entity: EntityName,
    pub last_incremental_load_date: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_excludes_inactive_and_other_codes() {
        let mut inactive = Tenant::active("b");
        inactive.status = TenantStatus::Inactive;

        assert!(TenantFilter::all().matches(&Tenant::active("a")));
        assert!(!TenantFilter::all().matches(&inactive));
        assert!(TenantFilter::code("a").matches(&Tenant::active("a")));
        assert!(!TenantFilter::code("a").matches(&Tenant::active("c")));
    }

    #[test]
    fn exposes_watermarks_per_entity() {
        let at = DateTime::from_timestamp_millis(1_767_225_600_000).unwrap();
        let mut tenant = Tenant::active("acme");
        tenant.watermarks.insert("order".into(), at);

        let marks: Vec<_> = tenant.client_watermarks().collect();
        assert_eq!(marks.len(), 1);
        assert_eq!(marks[0].entity.as_str(), "order");
        assert_eq!(marks[0].last_incremental_load_date, at);
        assert_eq!(tenant.watermark(&EntityName::new("order")), Some(at));
    }
}
