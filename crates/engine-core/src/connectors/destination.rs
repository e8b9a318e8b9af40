use crate::error::ObjectStoreError;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Smallest chunk most object stores accept for a non-final multipart chunk.
pub const MIN_MULTIPART_CHUNK: usize = 5 * 1024 * 1024;

/// Handle of an in-progress multipart upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipartUpload {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
}

/// Receipt for one uploaded chunk, needed to complete the upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedChunk {
    pub chunk_number: u32,
    pub etag: String,
}

/// Multipart object storage (S3 semantics): chunks are invisible until the
/// upload is completed; an aborted upload leaves nothing behind.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn create_multipart(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> Result<MultipartUpload, ObjectStoreError>;

    /// Chunk numbers start at 1 and must be uploaded in ascending order.
    async fn upload_chunk(
        &self,
        upload: &MultipartUpload,
        chunk_number: u32,
        data: Bytes,
    ) -> Result<CompletedChunk, ObjectStoreError>;

    async fn complete_multipart(
        &self,
        upload: &MultipartUpload,
        chunks: &[CompletedChunk],
    ) -> Result<(), ObjectStoreError>;

    async fn abort_multipart(&self, upload: &MultipartUpload) -> Result<(), ObjectStoreError>;
}
