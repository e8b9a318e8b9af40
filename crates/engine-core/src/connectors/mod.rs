pub mod destination;
pub mod queue;
pub mod source;
