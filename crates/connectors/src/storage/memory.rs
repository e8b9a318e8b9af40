use crate::storage::{etag, ordered_chunk_numbers};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use engine_core::{
    connectors::destination::{CompletedChunk, MultipartUpload, ObjectStore},
    error::ObjectStoreError,
};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub content_type: String,
    pub data: Bytes,
}

#[derive(Debug)]
struct PendingUpload {
    upload: MultipartUpload,
    content_type: String,
    chunks: BTreeMap<u32, Bytes>,
}

#[derive(Debug, Default)]
struct State {
    pending: HashMap<String, PendingUpload>,
    objects: BTreeMap<(String, String), StoredObject>,
    aborted: Vec<MultipartUpload>,
}

/// Object store kept in memory. Supports injecting transient chunk failures
/// and rejecting every upload whose key contains a marker.
#[derive(Clone, Default)]
pub struct InMemoryObjectStore {
    state: Arc<Mutex<State>>,
    transient_failures: Arc<AtomicUsize>,
    reject_marker: Option<String>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` chunk uploads fail with a transient error.
    pub fn with_transient_failures(self, count: usize) -> Self {
        self.transient_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Chunk uploads for keys containing `marker` are rejected.
    pub fn rejecting_keys_with(mut self, marker: &str) -> Self {
        self.reject_marker = Some(marker.to_string());
        self
    }

    pub async fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.state
            .lock()
            .await
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Keys stored in `bucket`, in lexicographic order.
    pub async fn keys(&self, bucket: &str) -> Vec<String> {
        self.state
            .lock()
            .await
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    pub async fn aborted(&self) -> Vec<MultipartUpload> {
        self.state.lock().await.aborted.clone()
    }

    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.pending.len()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn create_multipart(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> Result<MultipartUpload, ObjectStoreError> {
        let upload = MultipartUpload {
            bucket: bucket.to_string(),
            key: key.to_string(),
            upload_id: Uuid::new_v4().to_string(),
        };
        self.state.lock().await.pending.insert(
            upload.upload_id.clone(),
            PendingUpload {
                upload: upload.clone(),
                content_type: content_type.to_string(),
                chunks: BTreeMap::new(),
            },
        );
        Ok(upload)
    }

    async fn upload_chunk(
        &self,
        upload: &MultipartUpload,
        chunk_number: u32,
        data: Bytes,
    ) -> Result<CompletedChunk, ObjectStoreError> {
        if self
            .reject_marker
            .as_deref()
            .is_some_and(|marker| upload.key.contains(marker))
        {
            return Err(ObjectStoreError::Rejected(format!(
                "access denied for '{}'",
                upload.key
            )));
        }

        let injected = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(ObjectStoreError::Transient("slow down".to_string()));
        }

        let mut state = self.state.lock().await;
        let pending = state
            .pending
            .get_mut(&upload.upload_id)
            .ok_or_else(|| ObjectStoreError::UnknownUpload(upload.upload_id.clone()))?;
        let etag = etag(chunk_number, &data);
        pending.chunks.insert(chunk_number, data);
        Ok(CompletedChunk { chunk_number, etag })
    }

    async fn complete_multipart(
        &self,
        upload: &MultipartUpload,
        chunks: &[CompletedChunk],
    ) -> Result<(), ObjectStoreError> {
        let mut state = self.state.lock().await;
        let pending = state
            .pending
            .remove(&upload.upload_id)
            .ok_or_else(|| ObjectStoreError::UnknownUpload(upload.upload_id.clone()))?;

        let numbers = match ordered_chunk_numbers(&pending.chunks, chunks) {
            Ok(numbers) => numbers,
            Err(err) => {
                state.pending.insert(upload.upload_id.clone(), pending);
                return Err(err);
            }
        };

        let mut data = BytesMut::new();
        for number in numbers {
            if let Some(chunk) = pending.chunks.get(&number) {
                data.extend_from_slice(chunk);
            }
        }

        state.objects.insert(
            (pending.upload.bucket.clone(), pending.upload.key.clone()),
            StoredObject {
                content_type: pending.content_type,
                data: data.freeze(),
            },
        );
        Ok(())
    }

    async fn abort_multipart(&self, upload: &MultipartUpload) -> Result<(), ObjectStoreError> {
        let mut state = self.state.lock().await;
        match state.pending.remove(&upload.upload_id) {
            Some(pending) => {
                state.aborted.push(pending.upload);
                Ok(())
            }
            None => Err(ObjectStoreError::UnknownUpload(upload.upload_id.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn object_is_invisible_until_completed() {
        let store = InMemoryObjectStore::new();
        let upload = store
            .create_multipart("lake", "a/b.ndjson.gz", "application/gzip")
            .await
            .unwrap();
        let first = store
            .upload_chunk(&upload, 1, Bytes::from_static(b"hello "))
            .await
            .unwrap();
        let second = store
            .upload_chunk(&upload, 2, Bytes::from_static(b"world"))
            .await
            .unwrap();
        assert!(store.get("lake", "a/b.ndjson.gz").await.is_none());

        store
            .complete_multipart(&upload, &[first, second])
            .await
            .unwrap();
        let object = store.get("lake", "a/b.ndjson.gz").await.unwrap();
        assert_eq!(object.data, Bytes::from_static(b"hello world"));
        assert_eq!(object.content_type, "application/gzip");
        assert_eq!(store.pending_count().await, 0);
    }

    #[tokio::test]
    async fn abort_discards_chunks() {
        let store = InMemoryObjectStore::new();
        let upload = store.create_multipart("lake", "k", "application/gzip").await.unwrap();
        store
            .upload_chunk(&upload, 1, Bytes::from_static(b"x"))
            .await
            .unwrap();
        store.abort_multipart(&upload).await.unwrap();

        assert!(store.keys("lake").await.is_empty());
        assert_eq!(store.aborted().await, vec![upload]);
    }

    #[tokio::test]
    async fn injected_failures_are_transient_then_clear() {
        let store = InMemoryObjectStore::new().with_transient_failures(1);
        let upload = store.create_multipart("lake", "k", "application/gzip").await.unwrap();

        let err = store
            .upload_chunk(&upload, 1, Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(store.upload_chunk(&upload, 1, Bytes::from_static(b"x")).await.is_ok());
    }

    #[tokio::test]
    async fn completion_requires_uploaded_chunks() {
        let store = InMemoryObjectStore::new();
        let upload = store.create_multipart("lake", "k", "application/gzip").await.unwrap();
        let missing = CompletedChunk {
            chunk_number: 1,
            etag: "\"1-0\"".to_string(),
        };
        let err = store.complete_multipart(&upload, &[missing]).await.unwrap_err();
        assert!(matches!(err, ObjectStoreError::Rejected(_)));
        assert_eq!(store.pending_count().await, 1);
    }
}
