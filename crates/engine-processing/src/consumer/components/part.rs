use crate::{consumer::config::DumpOptions, error::UploadError};
use async_compression::{Level, tokio::write::GzipEncoder};
use bytes::Bytes;
use engine_core::{
    connectors::destination::{CompletedChunk, MultipartUpload, ObjectStore},
    error::ObjectStoreError,
    metrics::DumpMetrics,
    retry::{RetryDisposition, RetryPolicy},
};
use std::{mem, sync::Arc};
use tokio::{io::AsyncWriteExt, sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

/// Messages from the engine to a part's upload task.
#[derive(Debug)]
pub enum PartCommand {
    Line(Bytes),
    /// No more lines; finalize and complete the upload.
    Finish,
}

/// A completed part, as confirmed by the object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedPart {
    pub index: u32,
    pub key: String,
    pub raw_bytes: u64,
    pub compressed_bytes: u64,
    pub chunks: u32,
}

/// Resolves once the store has confirmed (or refused) the part.
pub type PartCompletion = JoinHandle<Result<UploadedPart, UploadError>>;

/// Write side of an open part. `write` waits while the bounded channel is
/// full, which is what pauses the cursor.
pub struct PartSink {
    index: u32,
    key: String,
    tx: mpsc::Sender<PartCommand>,
    handle: PartCompletion,
}

impl PartSink {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn write(&mut self, line: Bytes) -> Result<(), UploadError> {
        if self.tx.send(PartCommand::Line(line)).await.is_err() {
            return Err(self.failure().await);
        }
        Ok(())
    }

    /// Stops accepting lines. The returned handle completes in the background.
    pub async fn close(mut self) -> Result<PartCompletion, UploadError> {
        if self.tx.send(PartCommand::Finish).await.is_err() {
            return Err(self.failure().await);
        }
        Ok(self.handle)
    }

    /// The upload task went away early; report why.
    async fn failure(&mut self) -> UploadError {
        match (&mut self.handle).await {
            Ok(Err(err)) => err,
            Ok(Ok(_)) => UploadError::Abandoned {
                key: self.key.clone(),
            },
            Err(join) => UploadError::Join(join.to_string()),
        }
    }
}

/// Owns one gzip-compressed multipart upload. Dropping the sink without
/// `close` aborts the upload instead of committing a truncated object.
pub struct PartUploader {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    key: String,
    index: u32,
    content_type: String,
    chunk_bytes: usize,
    level: i32,
    retry: RetryPolicy,
    metrics: DumpMetrics,
}

impl PartUploader {
    /// Starts the upload task for part `index` and returns its sink.
    pub fn open(
        store: Arc<dyn ObjectStore>,
        options: &DumpOptions,
        key: String,
        index: u32,
        metrics: DumpMetrics,
    ) -> PartSink {
        let (tx, rx) = mpsc::channel(options.channel_capacity);
        let uploader = PartUploader {
            store,
            bucket: options.bucket.clone(),
            key: key.clone(),
            index,
            content_type: options.content_type.clone(),
            chunk_bytes: options.chunk_bytes,
            level: options.compression_level.min(9) as i32,
            retry: options.retry.clone(),
            metrics,
        };
        uploader.metrics.part_opened();
        let handle = tokio::spawn(uploader.run(rx));

        PartSink {
            index,
            key,
            tx,
            handle,
        }
    }

    async fn run(self, rx: mpsc::Receiver<PartCommand>) -> Result<UploadedPart, UploadError> {
        let upload = self
            .retry
            .run(
                || {
                    self.store
                        .create_multipart(&self.bucket, &self.key, &self.content_type)
                },
                |e| self.classify(e),
            )
            .await
            .map_err(|e| UploadError::Storage {
                key: self.key.clone(),
                source: e.into_inner(),
            })?;

        match self.pump(&upload, rx).await {
            Ok(part) => Ok(part),
            Err(err) => {
                match self.store.abort_multipart(&upload).await {
                    Ok(()) => warn!(key = %self.key, part = self.index, error = %err, "Multipart upload aborted"),
                    Err(abort_err) => warn!(
                        key = %self.key,
                        part = self.index,
                        error = %err,
                        abort_error = %abort_err,
                        "Failed to abort multipart upload"
                    ),
                }
                Err(err)
            }
        }
    }

    async fn pump(
        &self,
        upload: &MultipartUpload,
        mut rx: mpsc::Receiver<PartCommand>,
    ) -> Result<UploadedPart, UploadError> {
        let mut encoder = GzipEncoder::with_quality(
            Vec::with_capacity(self.chunk_bytes),
            Level::Precise(self.level),
        );
        let mut completed: Vec<CompletedChunk> = Vec::new();
        let mut raw_bytes = 0u64;
        let mut uploaded = 0u64;
        let mut finished = false;

        while let Some(command) = rx.recv().await {
            match command {
                PartCommand::Line(line) => {
                    raw_bytes += line.len() as u64;
                    encoder.write_all(&line).await?;
                    if encoder.get_ref().len() >= self.chunk_bytes {
                        let data = Bytes::from(mem::take(encoder.get_mut()));
                        uploaded += self.push_chunk(upload, &mut completed, data, uploaded).await?;
                    }
                }
                PartCommand::Finish => {
                    finished = true;
                    break;
                }
            }
        }

        if !finished {
            return Err(UploadError::Abandoned {
                key: self.key.clone(),
            });
        }

        encoder.shutdown().await?;
        let rest = Bytes::from(encoder.into_inner());
        if !rest.is_empty() || completed.is_empty() {
            uploaded += self.push_chunk(upload, &mut completed, rest, uploaded).await?;
        }

        self.retry
            .run(
                || self.store.complete_multipart(upload, &completed),
                |e| self.classify(e),
            )
            .await
            .map_err(|e| UploadError::Storage {
                key: self.key.clone(),
                source: e.into_inner(),
            })?;

        self.metrics.part_completed();
        info!(
            key = %self.key,
            part = self.index,
            raw_bytes,
            compressed_bytes = uploaded,
            chunks = completed.len(),
            "Part uploaded"
        );

        Ok(UploadedPart {
            index: self.index,
            key: self.key.clone(),
            raw_bytes,
            compressed_bytes: uploaded,
            chunks: completed.len() as u32,
        })
    }

    async fn push_chunk(
        &self,
        upload: &MultipartUpload,
        completed: &mut Vec<CompletedChunk>,
        data: Bytes,
        uploaded_before: u64,
    ) -> Result<u64, UploadError> {
        let number = completed.len() as u32 + 1;
        let len = data.len() as u64;
        let store = &self.store;

        let chunk = self
            .retry
            .run(
                move || store.upload_chunk(upload, number, data.clone()),
                |e| self.classify(e),
            )
            .await
            .map_err(|e| UploadError::Chunk {
                key: self.key.clone(),
                chunk: number,
                source: e.into_inner(),
            })?;

        self.metrics.bytes_uploaded(len);
        completed.push(chunk);
        debug!(
            key = %self.key,
            part = self.index,
            chunk = number,
            loaded = uploaded_before + len,
            "Upload progress"
        );
        Ok(len)
    }

    fn classify(&self, err: &ObjectStoreError) -> RetryDisposition {
        if err.is_transient() {
            self.metrics.upload_retried();
            RetryDisposition::Retry
        } else {
            RetryDisposition::Stop
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::InMemoryObjectStore;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn options() -> DumpOptions {
        DumpOptions {
            bucket: "lake".into(),
            channel_capacity: 2,
            retry: RetryPolicy::immediate(3),
            ..DumpOptions::default()
        }
    }

    fn gunzip(data: &[u8]) -> String {
        let mut out = String::new();
        GzDecoder::new(data).read_to_string(&mut out).unwrap();
        out
    }

    #[tokio::test]
    async fn uploads_compressed_lines() {
        let store = InMemoryObjectStore::new();
        let metrics = DumpMetrics::new();
        let mut sink = PartUploader::open(Arc::new(store.clone()), &options(), "k/1.ndjson.gz".into(), 1, metrics.clone());

        sink.write(Bytes::from_static(b"{\"a\":1}\n")).await.unwrap();
        sink.write(Bytes::from_static(b"{\"a\":2}\n")).await.unwrap();
        let part = sink.close().await.unwrap().await.unwrap().unwrap();

        assert_eq!(part.index, 1);
        assert_eq!(part.raw_bytes, 16);
        assert_eq!(part.chunks, 1);
        let object = store.get("lake", "k/1.ndjson.gz").await.unwrap();
        assert_eq!(object.content_type, "application/gzip");
        assert_eq!(gunzip(&object.data), "{\"a\":1}\n{\"a\":2}\n");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.parts_opened, 1);
        assert_eq!(snapshot.parts_completed, 1);
        assert_eq!(snapshot.bytes_uploaded, part.compressed_bytes);
    }

    #[tokio::test]
    async fn transient_chunk_errors_are_retried() {
        let store = InMemoryObjectStore::new().with_transient_failures(2);
        let metrics = DumpMetrics::new();
        let mut sink = PartUploader::open(Arc::new(store.clone()), &options(), "k.gz".into(), 1, metrics.clone());
        sink.write(Bytes::from_static(b"x\n")).await.unwrap();
        sink.close().await.unwrap().await.unwrap().unwrap();

        assert!(store.get("lake", "k.gz").await.is_some());
        assert_eq!(metrics.snapshot().upload_retries, 2);
    }

    #[tokio::test]
    async fn rejected_upload_is_aborted_and_reported() {
        let store = InMemoryObjectStore::new().rejecting_keys_with("denied");
        let mut sink = PartUploader::open(Arc::new(store.clone()), &options(), "denied/k.gz".into(), 1, DumpMetrics::new());
        sink.write(Bytes::from_static(b"x\n")).await.unwrap();

        let err = sink.close().await.unwrap().await.unwrap().unwrap_err();
        assert!(matches!(err, UploadError::Chunk { chunk: 1, .. }));
        assert_eq!(store.aborted().await.len(), 1);
        assert!(store.keys("lake").await.is_empty());
    }

    #[tokio::test]
    async fn dropped_sink_aborts_instead_of_committing() {
        let store = InMemoryObjectStore::new();
        let mut sink = PartUploader::open(Arc::new(store.clone()), &options(), "k.gz".into(), 1, DumpMetrics::new());
        sink.write(Bytes::from_static(b"x\n")).await.unwrap();
        let PartSink { handle, tx, .. } = sink;
        drop(tx);

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, UploadError::Abandoned { .. }));
        assert!(store.keys("lake").await.is_empty());
        assert_eq!(store.aborted().await.len(), 1);
    }

    #[tokio::test]
    async fn large_parts_are_split_into_chunks() {
        let store = InMemoryObjectStore::new();
        let mut sink = PartUploader::open(Arc::new(store.clone()), &options(), "big.gz".into(), 1, DumpMetrics::new());

        // Incompressible-ish payload so the gzip output crosses the 5 MiB chunk size.
        let mut state = 0x2545_f491_4f6c_dd1du64;
        let mut expected = String::new();
        for _ in 0..120_000 {
            let mut line = String::with_capacity(96);
            for _ in 0..8 {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                line.push_str(&format!("{state:016x}"));
            }
            line.push('\n');
            expected.push_str(&line);
            sink.write(Bytes::from(line)).await.unwrap();
        }
        let part = sink.close().await.unwrap().await.unwrap().unwrap();

        assert!(part.chunks >= 2);
        let object = store.get("lake", "big.gz").await.unwrap();
        assert_eq!(gunzip(&object.data), expected);
    }
}
