pub mod error;
pub mod pool;
pub mod queue;
pub mod scheduler;

pub use pool::{ConsumerPool, PoolSettings, PoolStats};
pub use queue::LocalQueue;
pub use scheduler::IncrementalScheduler;
