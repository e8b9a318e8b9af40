pub mod core;
pub mod records;
pub mod requests;
pub mod settings;
pub mod tenants;
