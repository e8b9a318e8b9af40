use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

use crate::core::utils::kebab_case;

/// Code of the tenant (client) whose data is being synced.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientCode(Arc<str>);

impl ClientCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(Arc::from(code.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ClientCode {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for ClientCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for ClientCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Entity name in its canonical kebab-case form (`Order Item` -> `order-item`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityName(Arc<str>);

impl EntityName {
    /// Normalizes the raw name before wrapping it.
    pub fn new(raw: &str) -> Self {
        Self(Arc::from(kebab_case(raw)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for EntityName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for EntityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deterministic identifier of an outbound window message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Arc<str>);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Arc::from(id.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_name_is_normalized() {
        assert_eq!(EntityName::new("Order Item").as_str(), "order-item");
        assert_eq!(EntityName::new("order").as_str(), "order");
        assert_eq!(EntityName::from("  --Stock__Level!! ").as_str(), "stock-level");
    }
}
