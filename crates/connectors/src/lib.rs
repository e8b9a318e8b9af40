pub mod error;
pub mod memory;
pub mod sql;
pub mod storage;

pub use memory::InMemoryRepository;
pub use sql::postgres::repository::{PgRepository, PgSourceOptions};
pub use storage::{local_fs::LocalFsObjectStore, memory::InMemoryObjectStore};
