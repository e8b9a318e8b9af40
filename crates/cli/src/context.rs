use crate::error::CliError;
use connectors::{InMemoryRepository, LocalFsObjectStore, PgRepository, PgSourceOptions};
use engine_config::{AppConfig, EntityCatalog, EnvManager};
use engine_core::{connectors::source::RepositoryRegistry, state::SledStateStore};
use engine_processing::{
    consumer::{DumpOptions, StreamDumpEngine},
    producer::{BatchDispatcher, LoadCoordinator},
};
use engine_runtime::{ConsumerPool, IncrementalScheduler, LocalQueue, PoolSettings};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{info, warn};

const CONFIG_FILE: &str = "lakesync.json";

/// `--config` when given, else `./lakesync.json`, else `~/.lakesync/lakesync.json`.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    let local = PathBuf::from(CONFIG_FILE);
    if local.exists() {
        return local;
    }
    dirs::home_dir()
        .map(|home| home.join(".lakesync").join(CONFIG_FILE))
        .filter(|p| p.exists())
        .unwrap_or(local)
}

pub fn load_config(path: Option<&Path>, env_file: Option<&Path>) -> Result<AppConfig, CliError> {
    let mut env = EnvManager::from_system();
    if let Some(file) = env_file {
        env.load_from_file(file)?;
    }
    Ok(AppConfig::load(resolve_config_path(path), &env)?)
}

pub fn open_state(config: &AppConfig) -> Result<SledStateStore, CliError> {
    let path = &config.state.path;
    let store = SledStateStore::open(path).map_err(|err| {
        CliError::Unexpected(format!(
            "Failed to open state store at {}: {err}",
            path.display()
        ))
    })?;
    Ok(store)
}

/// Every long-lived component of one process, wired from the configuration.
pub struct AppContext {
    pub catalog: Arc<EntityCatalog>,
    pub queue: Arc<LocalQueue>,
    pub coordinator: Arc<LoadCoordinator>,
    pub engine: Arc<StreamDumpEngine>,
    pub pool: ConsumerPool,
}

impl AppContext {
    pub async fn build(config: AppConfig) -> Result<Self, CliError> {
        let catalog = Arc::new(config.catalog());
        let state = open_state(&config)?;
        let shared_state = Arc::new(state);

        let queue = Arc::new(
            LocalQueue::new(config.queue.name.clone(), config.queue.capacity)
                .with_publish_timeout(config.queue.publish_timeout()),
        );
        let coordinator = Arc::new(LoadCoordinator::new(
            shared_state.clone(),
            shared_state.clone(),
            Arc::clone(&catalog),
            BatchDispatcher::new(queue.clone(), config.queue.name.clone()),
        ));

        let registry = repositories(&config, &catalog).await?;
        let store = Arc::new(LocalFsObjectStore::new(config.storage.root.clone()));
        let engine = Arc::new(StreamDumpEngine::new(
            registry,
            store,
            Arc::clone(&catalog),
            DumpOptions::from_config(&config),
        ));

        let pool = ConsumerPool::new(
            Arc::clone(&queue),
            Arc::clone(&engine),
            shared_state,
            PoolSettings::from_config(&config),
        );

        Ok(AppContext {
            catalog,
            queue,
            coordinator,
            engine,
            pool,
        })
    }

    pub fn scheduler(&self) -> IncrementalScheduler {
        IncrementalScheduler::new(Arc::clone(&self.coordinator), Arc::clone(&self.catalog))
    }
}

/// One repository per configured entity, all sharing a single source connection.
async fn repositories(
    config: &AppConfig,
    catalog: &EntityCatalog,
) -> Result<RepositoryRegistry, CliError> {
    let mut registry = RepositoryRegistry::new();

    match &config.source.postgres {
        Some(pg) => {
            // Fail fast on a bad URL; each dump opens its own connection later.
            PgRepository::connect(&pg.url).await?;
            let options = PgSourceOptions {
                schema: pg.schema.clone(),
                id_column: pg.id_column.clone(),
                client_column: pg.client_column.clone(),
            };
            for entity in catalog.entities() {
                registry.register(
                    entity.clone(),
                    Arc::new(PgRepository::new(pg.url.as_str(), options.clone())),
                );
            }
            info!(schema = %options.schema, entities = catalog.len(), "Postgres source ready");
        }
        None => {
            warn!("No source configured; entities read from an empty in-memory repository");
            let empty = InMemoryRepository::new();
            for entity in catalog.entities() {
                registry.register(entity.clone(), Arc::new(empty.clone()));
            }
        }
    }

    Ok(registry)
}
