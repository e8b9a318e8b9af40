use crate::error::RepositoryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use model::{
    core::identifiers::{ClientCode, EntityName},
    records::row::Row,
    requests::window::WindowMessage,
};
use std::{collections::HashMap, fmt, sync::Arc};

/// Lazily produced rows; dropping the stream releases the cursor.
pub type RowStream = BoxStream<'static, Result<Row, RepositoryError>>;

pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const CREATED_AT_FIELD: &str = "dateCreated";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Asc => f.write_str("ASC"),
            SortOrder::Desc => f.write_str("DESC"),
        }
    }
}

/// Tenant-independent description of the rows to stream for one window.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordQuery {
    pub entity: EntityName,
    /// Date field filtered on, inclusive on both ends.
    pub date_field: &'static str,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub order_by: &'static str,
    pub order: SortOrder,
    pub fields: Option<Vec<String>>,
    pub batch_size: usize,
}

impl RecordQuery {
    /// Query for a window: filter on `dateModified` (incremental) or
    /// `dateCreated` (initial), ascending by creation time.
    pub fn for_window(window: &WindowMessage, fields: Option<Vec<String>>, default_batch_size: usize) -> Self {
        RecordQuery {
            entity: window.entity_name(),
            date_field: window.load_type().date_field(),
            from: window.from,
            to: window.to,
            order_by: CREATED_AT_FIELD,
            order: SortOrder::Asc,
            fields,
            batch_size: window
                .limit
                .map(|l| l as usize)
                .filter(|l| *l > 0)
                .unwrap_or(default_batch_size),
        }
    }
}

/// Read access to one entity of the operational store.
#[async_trait]
pub trait EntityRepository: Send + Sync {
    /// Name of the store-native identifier field on returned rows.
    fn id_field(&self) -> &str {
        "_id"
    }

    /// Opens a cursor over the tenant's rows matching `query`.
    async fn query_stream(&self, client: &ClientCode, query: &RecordQuery) -> Result<RowStream, RepositoryError>;
}

/// Explicit entity -> repository mapping, built once at startup.
#[derive(Clone, Default)]
pub struct RepositoryRegistry {
    repositories: HashMap<EntityName, Arc<dyn EntityRepository>>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entity: EntityName, repository: Arc<dyn EntityRepository>) -> &mut Self {
        self.repositories.insert(entity, repository);
        self
    }

    pub fn with(mut self, entity: &str, repository: Arc<dyn EntityRepository>) -> Self {
        self.register(EntityName::new(entity), repository);
        self
    }

    pub fn resolve(&self, entity: &EntityName) -> Result<Arc<dyn EntityRepository>, RepositoryError> {
        self.repositories
            .get(entity)
            .cloned()
            .ok_or_else(|| RepositoryError::UnknownEntity(entity.to_string()))
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityName> {
        self.repositories.keys()
    }
}
