use engine_core::error::{QueueError, StateStoreError};
use engine_processing::error::LoadError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("State store error: {0}")]
    State(#[from] StateStoreError),

    #[error("Load failed: {0}")]
    Load(#[from] LoadError),

    /// The task was cancelled or panicked.
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Worker pool closed: {0}")]
    PoolClosed(#[from] tokio::sync::AcquireError),
}
