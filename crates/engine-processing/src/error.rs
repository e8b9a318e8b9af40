use engine_core::error::{ObjectStoreError, QueueError, RepositoryError, StateStoreError};
use model::{records::row::IdentifierError, requests::ValidationError};
use planner::PlanError;
use thiserror::Error;

/// Failures that abort a whole coordinator invocation. Per-tenant problems
/// are reported in the `LoadReport` instead.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Invalid load request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to plan load: {0}")]
    Plan(#[from] PlanError),

    #[error("Tenant directory unavailable: {0}")]
    Directory(#[from] StateStoreError),
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Batch of {size} windows exceeds the limit of {max}")]
    BatchTooLarge { size: usize, max: usize },

    #[error("Failed to encode window message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

/// First error of a failed dump invocation.
#[derive(Error, Debug)]
pub enum DumpError {
    #[error("Cursor failed: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Failed to transform record: {0}")]
    Transform(#[from] TransformError),

    #[error("Part upload failed: {0}")]
    Upload(#[from] UploadError),
}

#[derive(Error, Debug)]
pub enum TransformError {
    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    #[error("Failed to serialize record: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Storage error on '{key}': {source}")]
    Storage {
        key: String,
        #[source]
        source: ObjectStoreError,
    },

    #[error("Chunk {chunk} of '{key}' failed: {source}")]
    Chunk {
        key: String,
        chunk: u32,
        #[source]
        source: ObjectStoreError,
    },

    #[error("Compression failed: {0}")]
    Compression(#[from] std::io::Error),

    #[error("Part '{key}' was abandoned before it was finished")]
    Abandoned { key: String },

    #[error("Upload task failed: {0}")]
    Join(String),
}
