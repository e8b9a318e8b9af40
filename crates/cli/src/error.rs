use connectors::error::ConnectorError;
use engine_config::ConfigError;
use engine_core::error::StateStoreError;
use engine_processing::error::{DumpError, LoadError};
use engine_runtime::error::RuntimeError;
use model::requests::ValidationError;
use planner::PlanError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("State store error: {0}")]
    State(#[from] StateStoreError),

    #[error("Invalid load request: {0}")]
    Request(#[from] ValidationError),

    #[error("Planning failed: {0}")]
    Plan(#[from] PlanError),

    #[error("Load failed: {0}")]
    Load(#[from] LoadError),

    #[error("Dump failed: {0}")]
    Dump(#[from] DumpError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Source connection failed: {0}")]
    Connector(#[from] ConnectorError),

    /// PostgreSQL driver error.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Either --request or --entity is required")]
    MissingEntity,

    #[error("No Postgres source configured (source.postgres.url)")]
    NoSource,

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}
