pub mod components;
pub mod config;
pub mod engine;
pub mod key;
pub mod transform;

pub use config::DumpOptions;
pub use engine::{DumpPhase, DumpReport, DumpStatus, StreamDumpEngine};
