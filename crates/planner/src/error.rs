use model::requests::ValidationError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// The load request cannot be planned as given.
    #[error("Invalid load request: {0}")]
    Validation(#[from] ValidationError),

    /// Incremental sync has neither a stored watermark nor a configured starting point.
    #[error("Missing initialLoadDate for entity \"{entity}\"")]
    MissingInitialLoadDate { entity: String },
}
