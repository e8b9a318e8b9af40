use crate::{
    consumer::{
        components::part::{PartCompletion, PartSink, PartUploader, UploadedPart},
        config::DumpOptions,
        key::PartKeys,
        transform::RecordTransformer,
    },
    error::{DumpError, UploadError},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use engine_config::EntityCatalog;
use engine_core::{
    connectors::{
        destination::ObjectStore,
        source::{RecordQuery, RepositoryRegistry, RowStream},
    },
    metrics::DumpMetrics,
};
use futures::{StreamExt, future::try_join_all};
use model::{
    core::{
        identifiers::{ClientCode, EntityName},
        time::iso_millis,
    },
    requests::window::WindowMessage,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Lifecycle of one dump invocation.
///
/// `Idle -> Streaming -> {Writing <-> Rotating} -> Draining -> {Completed | Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpPhase {
    Idle,
    Streaming,
    Writing,
    Rotating,
    Draining,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpStatus {
    Completed,
    /// The message did not have the expected shape and was discarded.
    Dropped { reason: String },
}

#[derive(Debug, Clone)]
pub struct DumpReport {
    pub status: DumpStatus,
    pub client_code: ClientCode,
    pub pushed_at: DateTime<Utc>,
    pub records: u64,
    /// Completed parts ordered by index.
    pub parts: Vec<UploadedPart>,
}

impl DumpReport {
    fn dropped(client: &ClientCode, reason: String, pushed_at: DateTime<Utc>) -> Self {
        DumpReport {
            status: DumpStatus::Dropped { reason },
            client_code: client.clone(),
            pushed_at,
            records: 0,
            parts: Vec::new(),
        }
    }
}

/// Consumer side: turns one window message into size-bounded, gzip-compressed
/// NDJSON parts in object storage.
pub struct StreamDumpEngine {
    repositories: RepositoryRegistry,
    store: Arc<dyn ObjectStore>,
    catalog: Arc<EntityCatalog>,
    options: DumpOptions,
    metrics: DumpMetrics,
}

impl StreamDumpEngine {
    pub fn new(
        repositories: RepositoryRegistry,
        store: Arc<dyn ObjectStore>,
        catalog: Arc<EntityCatalog>,
        options: DumpOptions,
    ) -> Self {
        Self {
            repositories,
            store,
            catalog,
            options,
            metrics: DumpMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &DumpMetrics {
        &self.metrics
    }

    /// Entry point for a raw queue delivery. Malformed bodies are logged and
    /// dropped; they are never worth a retry.
    pub async fn handle(&self, client: &ClientCode, body: Value) -> Result<DumpReport, DumpError> {
        match WindowMessage::from_value(body) {
            Ok(window) => self.dump(client, &window).await,
            Err(err) => {
                warn!(client_code = %client, error = %err, "Dropping invalid window message");
                self.metrics.message_dropped();
                Ok(DumpReport::dropped(client, err.to_string(), Utc::now()))
            }
        }
    }

    pub async fn dump(&self, client: &ClientCode, window: &WindowMessage) -> Result<DumpReport, DumpError> {
        self.dump_at(client, window, Utc::now()).await
    }

    /// Dumps `window` for `client`; `pushed_at` stamps every record and key.
    pub async fn dump_at(
        &self,
        client: &ClientCode,
        window: &WindowMessage,
        pushed_at: DateTime<Utc>,
    ) -> Result<DumpReport, DumpError> {
        if let Err(err) = window.validate() {
            warn!(client_code = %client, error = %err, "Dropping invalid window message");
            self.metrics.message_dropped();
            return Ok(DumpReport::dropped(client, err.to_string(), pushed_at));
        }

        let entity = window.entity_name();
        let mut run = DumpRun::new(self, client, window, pushed_at);

        match run.execute(client, window, &entity).await {
            Ok(parts) => {
                run.transition(DumpPhase::Completed);
                info!(
                    client_code = %client,
                    entity = %entity,
                    from = %iso_millis(&window.from),
                    to = %iso_millis(&window.to),
                    records = run.records,
                    parts = parts.len(),
                    "Dump completed"
                );
                Ok(DumpReport {
                    status: DumpStatus::Completed,
                    client_code: client.clone(),
                    pushed_at,
                    records: run.records,
                    parts,
                })
            }
            Err(err) => {
                run.fail();
                error!(
                    client_code = %client,
                    entity = %entity,
                    from = %iso_millis(&window.from),
                    to = %iso_millis(&window.to),
                    error = %err,
                    "Dump failed"
                );
                Err(err)
            }
        }
    }
}

/// Rotation state: exactly one part is open for writes at a time.
struct PartState {
    index: u32,
    current_bytes: u64,
    open: Option<PartSink>,
}

/// State of one invocation, owned by it alone.
struct DumpRun<'a> {
    engine: &'a StreamDumpEngine,
    phase: DumpPhase,
    pushed_at: DateTime<Utc>,
    keys: PartKeys,
    max_bytes: u64,
    part: PartState,
    /// Closed parts still uploading; awaited together at drain.
    pending: Vec<PartCompletion>,
    records: u64,
}

impl<'a> DumpRun<'a> {
    fn new(
        engine: &'a StreamDumpEngine,
        client: &ClientCode,
        window: &WindowMessage,
        pushed_at: DateTime<Utc>,
    ) -> Self {
        DumpRun {
            engine,
            phase: DumpPhase::Idle,
            pushed_at,
            keys: PartKeys::new(&engine.options.microservice, client, window, pushed_at),
            max_bytes: engine.options.max_part_bytes(window),
            part: PartState {
                index: 0,
                current_bytes: 0,
                open: None,
            },
            pending: Vec::new(),
            records: 0,
        }
    }

    fn transition(&mut self, next: DumpPhase) {
        if self.phase != next {
            debug!(from = ?self.phase, to = ?next, part = self.part.index, "Dump phase");
            self.phase = next;
        }
    }

    async fn execute(
        &mut self,
        client: &ClientCode,
        window: &WindowMessage,
        entity: &EntityName,
    ) -> Result<Vec<UploadedPart>, DumpError> {
        let engine = self.engine;
        let repository = engine.repositories.resolve(entity)?;
        let fields = engine.catalog.get(entity).and_then(|s| s.fields.clone());
        let query = RecordQuery::for_window(window, fields, engine.options.default_batch_size);
        let transformer = RecordTransformer::new(client.clone(), repository.id_field(), self.pushed_at);

        self.transition(DumpPhase::Streaming);
        let mut rows: RowStream = repository.query_stream(client, &query).await?;
        while let Some(row) = rows.next().await {
            let line = transformer.to_line(row?)?;
            self.write_line(line).await?;
        }

        self.drain().await
    }

    fn needs_rotation(&self, line_len: u64) -> bool {
        match self.part.open {
            None => true,
            // A record is never split: an oversized line still gets a part of its own.
            Some(_) => {
                self.part.current_bytes > 0 && self.part.current_bytes + line_len > self.max_bytes
            }
        }
    }

    async fn write_line(&mut self, line: Bytes) -> Result<(), DumpError> {
        let len = line.len() as u64;
        if self.needs_rotation(len) {
            self.rotate().await?;
        }

        self.transition(DumpPhase::Writing);
        let sink = self
            .part
            .open
            .as_mut()
            .ok_or_else(|| UploadError::Abandoned {
                key: self.keys.part(self.part.index),
            })?;
        sink.write(line).await?;

        self.part.current_bytes += len;
        self.records += 1;
        self.engine.metrics.record_written(len);
        Ok(())
    }

    async fn rotate(&mut self) -> Result<(), DumpError> {
        self.transition(DumpPhase::Rotating);
        self.close_current().await?;

        self.part.index += 1;
        self.part.current_bytes = 0;
        let key = self.keys.part(self.part.index);
        debug!(part = self.part.index, key = %key, "Opening part");
        self.part.open = Some(PartUploader::open(
            self.engine.store.clone(),
            &self.engine.options,
            key,
            self.part.index,
            self.engine.metrics.clone(),
        ));
        Ok(())
    }

    async fn close_current(&mut self) -> Result<(), DumpError> {
        if let Some(sink) = self.part.open.take() {
            debug!(part = sink.index(), key = %sink.key(), bytes = self.part.current_bytes, "Closing part");
            self.pending.push(sink.close().await?);
        }
        Ok(())
    }

    async fn drain(&mut self) -> Result<Vec<UploadedPart>, DumpError> {
        self.transition(DumpPhase::Draining);
        self.close_current().await?;

        let handles = std::mem::take(&mut self.pending);
        let mut parts = try_join_all(handles.into_iter().map(|handle| async move {
            handle.await.map_err(|e| UploadError::Join(e.to_string()))?
        }))
        .await?;
        parts.sort_by_key(|p| p.index);
        Ok(parts)
    }

    /// Drops the open part, which aborts its upload. Parts already closed
    /// keep uploading and are not rolled back.
    fn fail(&mut self) {
        self.transition(DumpPhase::Failed);
        if let Some(sink) = self.part.open.take() {
            debug!(part = sink.index(), key = %sink.key(), "Abandoning open part");
        }
    }
}
