use crate::{
    core::{
        identifiers::{ClientCode, EntityName, MessageId},
        time::{flexible, iso_millis},
    },
    requests::ValidationError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a window belongs to the recurring incremental sync or to a historical initial load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadType {
    Incremental,
    Initial,
}

impl LoadType {
    pub fn from_flag(incremental: bool) -> Self {
        if incremental {
            LoadType::Incremental
        } else {
            LoadType::Initial
        }
    }

    /// Key segment used in object paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadType::Incremental => "incremental",
            LoadType::Initial => "initial",
        }
    }

    /// Store field the window filters on.
    pub fn date_field(&self) -> &'static str {
        match self {
            LoadType::Incremental => "dateModified",
            LoadType::Initial => "dateCreated",
        }
    }

    /// Human-readable name used in log lines.
    pub fn label(&self) -> &'static str {
        match self {
            LoadType::Incremental => "Incremental Load",
            LoadType::Initial => "Initial Load",
        }
    }
}

impl fmt::Display for LoadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of extraction work: every record of `entity` whose relevant date
/// falls in `[from, to]`. Immutable once enqueued; may be delivered more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowMessage {
    pub entity: String,
    pub incremental: bool,

    #[serde(with = "flexible")]
    pub from: DateTime<Utc>,

    #[serde(with = "flexible")]
    pub to: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,

    #[serde(default, rename = "maxSizeMB", skip_serializing_if = "Option::is_none")]
    pub max_size_mb: Option<u32>,
}

impl WindowMessage {
    pub fn new(entity: &EntityName, load_type: LoadType, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        WindowMessage {
            entity: entity.as_str().to_string(),
            incremental: load_type == LoadType::Incremental,
            from,
            to,
            limit: None,
            max_size_mb: None,
        }
    }

    pub fn with_limits(mut self, limit: Option<u32>, max_size_mb: Option<u32>) -> Self {
        self.limit = limit;
        self.max_size_mb = max_size_mb;
        self
    }

    /// Validates a raw queue body against the expected message shape.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ValidationError> {
        let message: WindowMessage = serde_json::from_value(value)
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;
        message.validate()?;
        Ok(message)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.entity.trim().is_empty() {
            return Err(ValidationError::MissingField("entity"));
        }

        if self.from > self.to {
            return Err(ValidationError::InvalidField {
                field: "from",
                reason: format!("{} is after {}", iso_millis(&self.from), iso_millis(&self.to)),
            });
        }

        if self.limit == Some(0) {
            return Err(ValidationError::InvalidField {
                field: "limit",
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.max_size_mb == Some(0) {
            return Err(ValidationError::InvalidField {
                field: "maxSizeMB",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    pub fn load_type(&self) -> LoadType {
        LoadType::from_flag(self.incremental)
    }

    pub fn entity_name(&self) -> EntityName {
        EntityName::new(&self.entity)
    }

    /// Stable id for this window as sent to one tenant.
    pub fn message_id(&self, client: &ClientCode) -> MessageId {
        let mut h = blake3::Hasher::new();
        h.update(client.as_str().as_bytes());
        h.update(b":");
        h.update(self.entity.as_bytes());
        h.update(b":");
        h.update(self.load_type().as_str().as_bytes());
        h.update(b":");
        h.update(iso_millis(&self.from).as_bytes());
        h.update(b":");
        h.update(iso_millis(&self.to).as_bytes());
        MessageId::new(format!("msg-{}", &h.finalize().to_hex()[..16]))
    }
}
