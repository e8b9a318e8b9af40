pub mod error;
pub mod plan;
pub mod window;

pub use error::PlanError;
pub use plan::plan;
pub use window::Windows;
