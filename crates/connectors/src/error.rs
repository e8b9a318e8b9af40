use engine_core::error::RepositoryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Invalid connection URL: {0}")]
    InvalidUrl(String),

    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("Postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("Invalid identifier '{0}'")]
    InvalidIdentifier(String),
}

impl From<ConnectorError> for RepositoryError {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::Postgres(e) if e.as_db_error().is_some() => {
                RepositoryError::Query(e.to_string())
            }
            ConnectorError::InvalidIdentifier(name) => {
                RepositoryError::Query(format!("invalid identifier '{name}'"))
            }
            other => RepositoryError::Connection(other.to_string()),
        }
    }
}
