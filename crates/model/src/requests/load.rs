use crate::{
    core::{identifiers::EntityName, time::flexible_opt},
    requests::ValidationError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload of a scheduled (or manual) load trigger.
///
/// Unknown fields are ignored and every field except `entity` is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadRequest {
    pub entity: String,

    #[serde(default)]
    pub incremental: bool,

    #[serde(default, with = "flexible_opt", skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,

    #[serde(default, with = "flexible_opt", skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,

    #[serde(default, rename = "maxSizeMB", skip_serializing_if = "Option::is_none")]
    pub max_size_mb: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_code: Option<String>,
}

impl LoadRequest {
    pub fn incremental(entity: &str) -> Self {
        LoadRequest {
            entity: entity.to_string(),
            incremental: true,
            ..Default::default()
        }
    }

    pub fn initial(entity: &str, from: DateTime<Utc>, to: Option<DateTime<Utc>>) -> Self {
        LoadRequest {
            entity: entity.to_string(),
            incremental: false,
            from: Some(from),
            to,
            ..Default::default()
        }
    }

    /// Parses a raw trigger payload. Some schedulers wrap it in `{"body": {...}}`.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ValidationError> {
        let value = match value {
            serde_json::Value::Object(mut map)
                if map.contains_key("body") && !map.contains_key("entity") =>
            {
                map.remove("body").unwrap_or_default()
            }
            other => other,
        };

        let request: LoadRequest = serde_json::from_value(value)
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.entity_name().is_empty() {
            return Err(ValidationError::MissingField("entity"));
        }

        if let Some(code) = &self.client_code
            && code.trim().is_empty()
        {
            return Err(ValidationError::InvalidField {
                field: "clientCode",
                reason: "must not be blank".to_string(),
            });
        }

        for (field, value) in [("limit", self.limit), ("maxSizeMB", self.max_size_mb)] {
            if value == Some(0) {
                return Err(ValidationError::InvalidField {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn entity_name(&self) -> EntityName {
        EntityName::new(&self.entity)
    }

    pub fn client_code(&self) -> Option<&str> {
        self.client_code.as_deref()
    }
}
