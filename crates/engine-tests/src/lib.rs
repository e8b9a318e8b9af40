#![allow(dead_code)]

use connectors::{InMemoryObjectStore, InMemoryRepository};
use engine_config::EntityCatalog;
use engine_core::{connectors::source::RepositoryRegistry, retry::RetryPolicy, state::SledStateStore};
use engine_processing::{
    consumer::{DumpOptions, StreamDumpEngine},
    producer::{BatchDispatcher, LoadCoordinator},
};
use engine_runtime::{ConsumerPool, LocalQueue, PoolSettings};
use model::{settings::entity::EntitySettings, tenants::Tenant};
use std::{sync::Arc, time::Duration};

pub mod utils;

pub const BUCKET: &str = "lake";
pub const QUEUE: &str = "data-lake-sync";
pub const SERVICE: &str = "oms";
pub const ENTITY: &str = "order";

/// Producer, queue, consumer pool and storage wired together in memory.
pub struct Pipeline {
    pub state: SledStateStore,
    pub repository: InMemoryRepository,
    pub store: InMemoryObjectStore,
    pub queue: Arc<LocalQueue>,
    pub coordinator: LoadCoordinator,
    pub engine: Arc<StreamDumpEngine>,
    pub pool: ConsumerPool,
}

pub struct PipelineBuilder {
    settings: EntitySettings,
    repository: InMemoryRepository,
    store: InMemoryObjectStore,
    queue_capacity: usize,
    publish_timeout: Duration,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        PipelineBuilder {
            settings: EntitySettings::new(ENTITY),
            repository: InMemoryRepository::new(),
            store: InMemoryObjectStore::new(),
            queue_capacity: 1024,
            publish_timeout: Duration::from_millis(50),
        }
    }

    pub fn settings(mut self, settings: EntitySettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn repository(mut self, repository: InMemoryRepository) -> Self {
        self.repository = repository;
        self
    }

    pub fn store(mut self, store: InMemoryObjectStore) -> Self {
        self.store = store;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    pub async fn build(self, tenants: &[Tenant]) -> Pipeline {
        let state = SledStateStore::temporary().expect("temporary state store");
        for tenant in tenants {
            state.upsert_tenant(tenant).await.expect("seed tenant");
        }

        let catalog = Arc::new(EntityCatalog::from_settings([self.settings]));
        let queue = Arc::new(
            LocalQueue::new(QUEUE, self.queue_capacity).with_publish_timeout(self.publish_timeout),
        );
        let shared_state = Arc::new(state.clone());

        let coordinator = LoadCoordinator::new(
            shared_state.clone(),
            shared_state.clone(),
            Arc::clone(&catalog),
            BatchDispatcher::new(queue.clone(), QUEUE),
        );

        let options = DumpOptions {
            microservice: SERVICE.into(),
            bucket: BUCKET.into(),
            channel_capacity: 8,
            retry: RetryPolicy::immediate(3),
            ..DumpOptions::default()
        };
        let engine = Arc::new(StreamDumpEngine::new(
            RepositoryRegistry::new().with(ENTITY, Arc::new(self.repository.clone())),
            Arc::new(self.store.clone()),
            catalog,
            options,
        ));

        let pool = ConsumerPool::new(
            Arc::clone(&queue),
            Arc::clone(&engine),
            shared_state,
            PoolSettings {
                max_concurrency: 4,
                max_receive_count: 2,
                redelivery_delay: Duration::from_millis(10),
            },
        );

        Pipeline {
            state,
            repository: self.repository,
            store: self.store,
            queue,
            coordinator,
            engine,
            pool,
        }
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
