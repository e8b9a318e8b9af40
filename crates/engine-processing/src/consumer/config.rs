use engine_config::app::{AppConfig, GZIP_CONTENT_TYPE};
use engine_core::{connectors::destination::MIN_MULTIPART_CHUNK, retry::RetryPolicy};
use model::requests::window::WindowMessage;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Settings of the consumer side, derived once from the process configuration.
#[derive(Debug, Clone)]
pub struct DumpOptions {
    /// First key segment (`microservice=...`).
    pub microservice: String,
    pub bucket: String,
    pub default_batch_size: usize,
    pub default_max_size_mb: u32,
    /// Lines buffered between the engine and the open part before writes block.
    pub channel_capacity: usize,
    pub chunk_bytes: usize,
    pub compression_level: u32,
    pub content_type: String,
    pub retry: RetryPolicy,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl DumpOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            microservice: config.service.name.clone(),
            bucket: config.storage.bucket.clone(),
            default_batch_size: config.dump.default_batch_size,
            default_max_size_mb: config.dump.default_max_size_mb,
            channel_capacity: config.dump.channel_capacity.max(1),
            chunk_bytes: config.dump.upload_chunk_bytes.max(MIN_MULTIPART_CHUNK),
            compression_level: config.dump.compression_level,
            content_type: GZIP_CONTENT_TYPE.to_string(),
            retry: RetryPolicy::for_object_storage(),
        }
    }

    /// Soft ceiling of one part, in uncompressed bytes.
    pub fn max_part_bytes(&self, window: &WindowMessage) -> u64 {
        u64::from(window.max_size_mb.unwrap_or(self.default_max_size_mb)) * BYTES_PER_MB
    }
}
