use crate::storage::{etag, ordered_chunk_numbers};
use async_trait::async_trait;
use bytes::Bytes;
use engine_core::{
    connectors::destination::{CompletedChunk, MultipartUpload, ObjectStore},
    error::ObjectStoreError,
};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tokio::{fs, io::AsyncWriteExt};
use tracing::debug;
use uuid::Uuid;

const STAGING_DIR: &str = ".multipart";

/// Object store on the local filesystem: objects land at
/// `{root}/{bucket}/{key}`, chunks are staged under `{root}/.multipart/{upload_id}`.
#[derive(Debug, Clone)]
pub struct LocalFsObjectStore {
    root: PathBuf,
}

impl LocalFsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        let mut path = self.root.join(bucket);
        for segment in key.split('/').filter(|s| !s.is_empty() && *s != "..") {
            path.push(segment);
        }
        path
    }

    fn staging_path(&self, upload_id: &str) -> PathBuf {
        self.root.join(STAGING_DIR).join(upload_id)
    }

    async fn staged_dir(&self, upload: &MultipartUpload) -> Result<PathBuf, ObjectStoreError> {
        let dir = self.staging_path(&upload.upload_id);
        if fs::try_exists(&dir).await? {
            Ok(dir)
        } else {
            Err(ObjectStoreError::UnknownUpload(upload.upload_id.clone()))
        }
    }
}

fn chunk_file(dir: &Path, chunk_number: u32) -> PathBuf {
    dir.join(format!("{chunk_number:05}.chunk"))
}

#[async_trait]
impl ObjectStore for LocalFsObjectStore {
    async fn create_multipart(
        &self,
        bucket: &str,
        key: &str,
        _content_type: &str,
    ) -> Result<MultipartUpload, ObjectStoreError> {
        let upload = MultipartUpload {
            bucket: bucket.to_string(),
            key: key.to_string(),
            upload_id: Uuid::new_v4().to_string(),
        };
        fs::create_dir_all(self.staging_path(&upload.upload_id)).await?;
        Ok(upload)
    }

    async fn upload_chunk(
        &self,
        upload: &MultipartUpload,
        chunk_number: u32,
        data: Bytes,
    ) -> Result<CompletedChunk, ObjectStoreError> {
        let dir = self.staged_dir(upload).await?;
        let etag = etag(chunk_number, &data);
        fs::write(chunk_file(&dir, chunk_number), &data).await?;
        Ok(CompletedChunk { chunk_number, etag })
    }

    async fn complete_multipart(
        &self,
        upload: &MultipartUpload,
        chunks: &[CompletedChunk],
    ) -> Result<(), ObjectStoreError> {
        let dir = self.staged_dir(upload).await?;

        let mut staged = BTreeMap::new();
        for chunk in chunks {
            let path = chunk_file(&dir, chunk.chunk_number);
            if fs::try_exists(&path).await? {
                staged.insert(chunk.chunk_number, Bytes::new());
            }
        }
        let numbers = ordered_chunk_numbers(&staged, chunks)?;

        let target = self.object_path(&upload.bucket, &upload.key);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        // Assemble next to the target, then rename so readers never see a
        // half-written object.
        let partial = target.with_extension("partial");
        let mut file = fs::File::create(&partial).await?;
        for number in numbers {
            let data = fs::read(chunk_file(&dir, number)).await?;
            file.write_all(&data).await?;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&partial, &target).await?;
        fs::remove_dir_all(&dir).await?;
        debug!(key = %upload.key, path = %target.display(), "Multipart upload completed");
        Ok(())
    }

    async fn abort_multipart(&self, upload: &MultipartUpload) -> Result<(), ObjectStoreError> {
        let dir = self.staged_dir(upload).await?;
        fs::remove_dir_all(dir).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn completes_into_bucket_tree() {
        let dir = tempdir().unwrap();
        let store = LocalFsObjectStore::new(dir.path());
        let key = "microservice=svc/entity=order/part-001.ndjson.gz";

        let upload = store.create_multipart("raw", key, "application/gzip").await.unwrap();
        let a = store.upload_chunk(&upload, 1, Bytes::from_static(b"ab")).await.unwrap();
        let b = store.upload_chunk(&upload, 2, Bytes::from_static(b"cd")).await.unwrap();
        store.complete_multipart(&upload, &[a, b]).await.unwrap();

        let path = store.object_path("raw", key);
        assert_eq!(std::fs::read(&path).unwrap(), b"abcd");
        assert!(!dir.path().join(STAGING_DIR).join(&upload.upload_id).exists());
    }

    #[tokio::test]
    async fn abort_removes_staged_chunks() {
        let dir = tempdir().unwrap();
        let store = LocalFsObjectStore::new(dir.path());
        let upload = store.create_multipart("raw", "k.gz", "application/gzip").await.unwrap();
        store.upload_chunk(&upload, 1, Bytes::from_static(b"x")).await.unwrap();
        store.abort_multipart(&upload).await.unwrap();

        assert!(!store.object_path("raw", "k.gz").exists());
        let err = store.upload_chunk(&upload, 2, Bytes::from_static(b"y")).await.unwrap_err();
        assert!(matches!(err, ObjectStoreError::UnknownUpload(_)));
    }

    #[test]
    fn object_path_ignores_parent_segments() {
        let store = LocalFsObjectStore::new("/data");
        assert_eq!(
            store.object_path("raw", "../a//b.gz"),
            PathBuf::from("/data/raw/a/b.gz")
        );
    }
}
