use model::{core::identifiers::EntityName, settings::entity::EntitySettings};
use std::collections::BTreeMap;

/// Entity settings keyed by canonical entity name. Built once per process.
#[derive(Debug, Clone, Default)]
pub struct EntityCatalog {
    entries: BTreeMap<EntityName, EntitySettings>,
}

impl EntityCatalog {
    /// Later duplicates of the same (normalized) name replace earlier ones.
    pub fn from_settings(settings: impl IntoIterator<Item = EntitySettings>) -> Self {
        let entries = settings
            .into_iter()
            .map(|s| (s.entity_name(), s))
            .collect();
        Self { entries }
    }

    pub fn get(&self, entity: &EntityName) -> Option<&EntitySettings> {
        self.entries.get(entity)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityName> {
        self.entries.keys()
    }

    pub fn settings(&self) -> impl Iterator<Item = &EntitySettings> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
