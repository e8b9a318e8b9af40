pub mod identifiers;
pub mod time;
pub mod utils;
