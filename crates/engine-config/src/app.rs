use crate::{
    catalog::EntityCatalog,
    env::{BUCKET_VAR, EnvManager, QUEUE_VAR, SERVICE_NAME_VAR, STATE_PATH_VAR},
    error::ConfigError,
};
use model::settings::entity::EntitySettings;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}, time::Duration};
use tracing::debug;

pub const DEFAULT_MAX_SIZE_MB: u32 = 500;
pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;
pub const GZIP_CONTENT_TYPE: &str = "application/gzip";

/// The `lakesync.json` document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub data_lake: DataLakeConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub dump: DumpConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub state: StateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Microservice segment of every object key.
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "lakesync".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataLakeConfig {
    #[serde(default)]
    pub entities: Vec<EntitySettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    pub bucket: String,
    /// Directory of the local object store.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("data-lake")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: "data-lake-raw".to_string(),
            root: default_storage_root(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueConfig {
    pub name: String,
    pub capacity: usize,
    pub max_receive_count: u32,
    pub max_concurrency: usize,
    pub redelivery_delay_ms: u64,
    /// How long a publish waits for room before the message is rejected.
    pub publish_timeout_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "data-lake-sync".to_string(),
            capacity: 10_000,
            max_receive_count: 2,
            max_concurrency: 4,
            redelivery_delay_ms: 1_000,
            publish_timeout_ms: 30_000,
        }
    }
}

impl QueueConfig {
    pub fn redelivery_delay(&self) -> Duration {
        Duration::from_millis(self.redelivery_delay_ms)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DumpConfig {
    pub default_batch_size: usize,
    #[serde(rename = "defaultMaxSizeMB")]
    pub default_max_size_mb: u32,
    /// Bounded capacity, in messages, between the engine and an open part.
    pub channel_capacity: usize,
    pub upload_chunk_bytes: usize,
    pub compression_level: u32,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            default_batch_size: DEFAULT_BATCH_SIZE,
            default_max_size_mb: DEFAULT_MAX_SIZE_MB,
            channel_capacity: 64,
            upload_chunk_bytes: DEFAULT_CHUNK_BYTES,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub postgres: Option<PostgresConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostgresConfig {
    pub url: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    #[serde(default = "default_client_column")]
    pub client_column: String,
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_id_column() -> String {
    "_id".to_string()
}

fn default_client_column() -> String {
    "clientCode".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("lakesync-state"),
        }
    }
}

impl AppConfig {
    /// Reads the document, applies environment overrides and validates.
    pub fn load(path: impl AsRef<Path>, env: &EnvManager) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_json_str(&raw)?;
        config.apply_env(env);
        config.validate()?;
        debug!(path = %path.display(), entities = config.data_lake.entities.len(), "Configuration loaded");
        Ok(config)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn apply_env(&mut self, env: &EnvManager) {
        if let Some(name) = env.get(SERVICE_NAME_VAR) {
            self.service.name = name.to_string();
        }
        if let Some(bucket) = env.get(BUCKET_VAR) {
            self.storage.bucket = bucket.to_string();
        }
        if let Some(queue) = env.get(QUEUE_VAR) {
            self.queue.name = queue.to_string();
        }
        if let Some(path) = env.get(STATE_PATH_VAR) {
            self.state.path = PathBuf::from(path);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_lake.entities.is_empty() {
            return Err(ConfigError::MissingEntities);
        }
        if let Some(bad) = self
            .data_lake
            .entities
            .iter()
            .find(|e| e.entity_name().is_empty())
        {
            return Err(ConfigError::Invalid {
                field: "dataLake.entities.name",
                reason: format!("'{}' is not a usable entity name", bad.name),
            });
        }
        if self.service.name.trim().is_empty() {
            return Err(invalid("service.name", "must not be empty"));
        }
        if self.storage.bucket.trim().is_empty() {
            return Err(invalid("storage.bucket", "must not be empty"));
        }
        if self.queue.capacity == 0 {
            return Err(invalid("queue.capacity", "must be positive"));
        }
        if self.queue.max_concurrency == 0 {
            return Err(invalid("queue.maxConcurrency", "must be positive"));
        }
        if self.queue.max_receive_count == 0 {
            return Err(invalid("queue.maxReceiveCount", "must be positive"));
        }
        if self.dump.default_max_size_mb == 0 {
            return Err(invalid("dump.defaultMaxSizeMB", "must be positive"));
        }
        if self.dump.channel_capacity == 0 {
            return Err(invalid("dump.channelCapacity", "must be positive"));
        }
        if self.dump.upload_chunk_bytes < DEFAULT_CHUNK_BYTES {
            return Err(invalid("dump.uploadChunkBytes", "must be at least 5 MiB"));
        }
        if self.dump.compression_level > 9 {
            return Err(invalid("dump.compressionLevel", "must be between 0 and 9"));
        }
        Ok(())
    }

    pub fn catalog(&self) -> EntityCatalog {
        EntityCatalog::from_settings(self.data_lake.entities.iter().cloned())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
