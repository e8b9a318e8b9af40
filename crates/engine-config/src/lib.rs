pub mod app;
pub mod catalog;
pub mod env;
pub mod error;

pub use app::AppConfig;
pub use catalog::EntityCatalog;
pub use env::EnvManager;
pub use error::ConfigError;
