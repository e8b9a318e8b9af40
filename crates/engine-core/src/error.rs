use thiserror::Error;

/// Errors from the tenant/watermark/dead-letter state store.
#[derive(Error, Debug)]
pub enum StateStoreError {
    #[error("Storage error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Failed to (de)serialize state entry: {0}")]
    Serialization(String),

    #[error("Tenant '{0}' not found")]
    TenantNotFound(String),
}

/// Errors raised by an entity repository while opening or reading a cursor.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("No repository registered for entity '{0}'")]
    UnknownEntity(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Failed to decode row: {0}")]
    Decode(String),
}

/// Errors raised by object storage.
#[derive(Error, Debug)]
pub enum ObjectStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown multipart upload '{0}'")]
    UnknownUpload(String),

    #[error("Object '{bucket}/{key}' not found")]
    NotFound { bucket: String, key: String },

    /// Temporary condition (throttling, timeouts); the same call may succeed later.
    #[error("Transient storage failure: {0}")]
    Transient(String),

    #[error("Request rejected by storage: {0}")]
    Rejected(String),
}

impl ObjectStoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ObjectStoreError::Transient(_))
    }
}

/// Errors raised by the message queue transport itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Queue '{0}' is closed")]
    Closed(String),

    #[error("Unknown queue destination '{0}'")]
    UnknownDestination(String),

    #[error("Transport error: {0}")]
    Transport(String),
}
