use crate::core::{identifiers::EntityName, time::flexible_opt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_FREQUENCY_MINUTES: u32 = 60;

/// Static per-entity configuration, read-only during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySettings {
    pub name: String,

    /// Where incremental sync starts for tenants that have no watermark yet.
    #[serde(default, with = "flexible_opt", skip_serializing_if = "Option::is_none")]
    pub initial_load_date: Option<DateTime<Utc>>,

    #[serde(default, alias = "frequency", skip_serializing_if = "Option::is_none")]
    pub frequency_minutes: Option<u32>,

    /// Projection applied when reading rows; all fields when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

impl EntitySettings {
    pub fn new(name: &str) -> Self {
        EntitySettings {
            name: name.to_string(),
            initial_load_date: None,
            frequency_minutes: None,
            fields: None,
        }
    }

    pub fn with_initial_load_date(mut self, ts: DateTime<Utc>) -> Self {
        self.initial_load_date = Some(ts);
        self
    }

    pub fn entity_name(&self) -> EntityName {
        EntityName::new(&self.name)
    }

    pub fn frequency(&self) -> Duration {
        let minutes = self
            .frequency_minutes
            .filter(|m| *m > 0)
            .unwrap_or(DEFAULT_FREQUENCY_MINUTES);
        Duration::from_secs(u64::from(minutes) * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_document_shape() {
        let settings: EntitySettings = serde_json::from_value(json!({
            "name": "order",
            "initialLoadDate": "2025-01-01",
            "frequency": 15,
            "fields": ["_id", "total"]
        }))
        .unwrap();

        assert_eq!(settings.frequency(), Duration::from_secs(900));
        assert_eq!(settings.fields.as_deref().map(|f| f.len()), Some(2));
        assert!(settings.initial_load_date.is_some());
    }

    #[test]
    fn frequency_defaults_to_an_hour() {
        assert_eq!(EntitySettings::new("order").frequency(), Duration::from_secs(3600));
    }
}
