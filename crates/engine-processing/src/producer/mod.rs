pub mod components;
pub mod coordinator;

pub use components::dispatcher::{BatchDispatcher, MAX_BATCH_SIZE};
pub use coordinator::{LoadCoordinator, LoadReport, TenantOutcome, TenantReport};
