use crate::{error::RuntimeError, queue::LocalQueue};
use chrono::Utc;
use engine_config::AppConfig;
use engine_core::{
    connectors::queue::Delivery,
    state::{DeadLetter, DeadLetterStore},
};
use engine_processing::consumer::{DumpStatus, StreamDumpEngine};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{OwnedSemaphorePermit, Semaphore},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_concurrency: usize,
    /// Deliveries allowed before a message goes to the dead-letter store.
    pub max_receive_count: u32,
    pub redelivery_delay: Duration,
}

impl PoolSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        PoolSettings {
            max_concurrency: config.queue.max_concurrency,
            max_receive_count: config.queue.max_receive_count,
            redelivery_delay: config.queue.redelivery_delay(),
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        PoolSettings {
            max_concurrency: 4,
            max_receive_count: 2,
            redelivery_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub completed: usize,
    pub dropped: usize,
    pub redelivered: usize,
    pub dead_lettered: usize,
}

impl PoolStats {
    fn record(&mut self, outcome: DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Completed => self.completed += 1,
            DeliveryOutcome::Dropped => self.dropped += 1,
            DeliveryOutcome::Redelivered => self.redelivered += 1,
            DeliveryOutcome::DeadLettered => self.dead_lettered += 1,
        }
    }

    fn absorb(&mut self, other: PoolStats) {
        self.completed += other.completed;
        self.dropped += other.dropped;
        self.redelivered += other.redelivered;
        self.dead_lettered += other.dead_lettered;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeliveryOutcome {
    Completed,
    Dropped,
    Redelivered,
    DeadLettered,
}

enum Mode {
    /// Until cancelled or the queue closes.
    Serve(CancellationToken),
    /// Until nothing is outstanding.
    Drain,
}

/// Runs dump jobs off the local queue with bounded concurrency.
#[derive(Clone)]
pub struct ConsumerPool {
    queue: Arc<LocalQueue>,
    engine: Arc<StreamDumpEngine>,
    dead_letters: Arc<dyn DeadLetterStore>,
    settings: PoolSettings,
}

impl ConsumerPool {
    pub fn new(
        queue: Arc<LocalQueue>,
        engine: Arc<StreamDumpEngine>,
        dead_letters: Arc<dyn DeadLetterStore>,
        settings: PoolSettings,
    ) -> Self {
        ConsumerPool {
            queue,
            engine,
            dead_letters,
            settings,
        }
    }

    pub async fn run(&self, cancel: CancellationToken) -> Result<PoolStats, RuntimeError> {
        self.process(Mode::Serve(cancel)).await
    }

    /// Handles deliveries until every published message is acknowledged,
    /// pending redeliveries included.
    pub async fn drain(&self) -> Result<PoolStats, RuntimeError> {
        self.process(Mode::Drain).await
    }

    /// Serves deliveries while `producer` publishes, then drains the rest.
    /// Publishers blocked on a full queue make progress as messages are consumed.
    pub async fn consume_during<F>(&self, producer: F) -> Result<(F::Output, PoolStats), RuntimeError>
    where
        F: Future,
    {
        let cancel = CancellationToken::new();
        let serving = {
            let pool = self.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { pool.run(cancel).await })
        };

        let output = producer.await;
        cancel.cancel();

        let mut stats = serving.await??;
        stats.absorb(self.drain().await?);
        Ok((output, stats))
    }

    async fn process(&self, mode: Mode) -> Result<PoolStats, RuntimeError> {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let mut tasks: JoinSet<DeliveryOutcome> = JoinSet::new();
        let mut stats = PoolStats::default();

        loop {
            let permit = Arc::clone(&semaphore).acquire_owned().await?;

            let delivery = match &mode {
                Mode::Serve(cancel) => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        next = self.queue.receive() => match next {
                            Some(delivery) => delivery,
                            None => break,
                        },
                    }
                }
                Mode::Drain => match self.queue.try_receive().await {
                    Some(delivery) => delivery,
                    None if self.queue.is_idle() => break,
                    None => {
                        drop(permit);
                        match tasks.join_next().await {
                            Some(joined) => stats.record(joined?),
                            None => tokio::time::sleep(Duration::from_millis(10)).await,
                        }
                        continue;
                    }
                },
            };

            let worker = self.clone();
            tasks.spawn(async move { worker.handle_delivery(delivery, permit).await });

            while let Some(joined) = tasks.try_join_next() {
                stats.record(joined?);
            }
        }

        while let Some(joined) = tasks.join_next().await {
            stats.record(joined?);
        }

        info!(
            completed = stats.completed,
            dropped = stats.dropped,
            redelivered = stats.redelivered,
            dead_lettered = stats.dead_lettered,
            "Consumer pool stopped"
        );
        Ok(stats)
    }

    async fn handle_delivery(&self, delivery: Delivery, permit: OwnedSemaphorePermit) -> DeliveryOutcome {
        let result = self
            .engine
            .handle(&delivery.client_code, delivery.body.clone())
            .await;
        drop(permit);

        let err = match result {
            Ok(report) => {
                self.queue.ack();
                return match report.status {
                    DumpStatus::Completed => DeliveryOutcome::Completed,
                    DumpStatus::Dropped { .. } => DeliveryOutcome::Dropped,
                };
            }
            Err(err) => err,
        };

        if delivery.receive_count < self.settings.max_receive_count {
            warn!(
                message_id = %delivery.message_id,
                client_code = %delivery.client_code,
                receive_count = delivery.receive_count,
                error = %err,
                "Dump failed, message will be redelivered"
            );
            self.queue.requeue(delivery, self.settings.redelivery_delay);
            return DeliveryOutcome::Redelivered;
        }

        error!(
            message_id = %delivery.message_id,
            client_code = %delivery.client_code,
            receive_count = delivery.receive_count,
            error = %err,
            "Dump failed on final delivery, moving message to dead letters"
        );
        let letter = DeadLetter {
            message_id: delivery.message_id.to_string(),
            client_code: delivery.client_code.to_string(),
            body: delivery.body.to_string(),
            receive_count: delivery.receive_count,
            error: err.to_string(),
            failed_at: Utc::now(),
        };
        if let Err(store_err) = self.dead_letters.append(&letter).await {
            error!(
                message_id = %letter.message_id,
                error = %store_err,
                "Failed to record dead letter"
            );
        }
        self.queue.ack();
        DeliveryOutcome::DeadLettered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone};
    use connectors::{InMemoryObjectStore, InMemoryRepository};
    use engine_config::EntityCatalog;
    use engine_core::{
        connectors::{
            queue::{OutboundMessage, OutboundQueue},
            source::RepositoryRegistry,
        },
        state::SledStateStore,
    };
    use engine_processing::consumer::DumpOptions;
    use model::{
        core::identifiers::{ClientCode, MessageId},
        records::row::Row,
        requests::window::{LoadType, WindowMessage},
        settings::entity::EntitySettings,
    };
    use serde_json::json;

    fn ts(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, d, 0, 0, 0).unwrap()
    }

    fn row(id: u32) -> Row {
        serde_json::from_value(json!({
            "_id": format!("o-{id}"),
            "dateCreated": "2026-03-01T10:00:00.000Z",
            "dateModified": "2026-03-01T10:00:00.000Z",
        }))
        .unwrap()
    }

    fn setup(repo: InMemoryRepository, store: InMemoryObjectStore) -> (Arc<LocalQueue>, ConsumerPool, SledStateStore) {
        let queue = Arc::new(LocalQueue::new("sync", 16));
        let (pool, state) = pool_for(Arc::clone(&queue), repo, store);
        (queue, pool, state)
    }

    fn pool_for(
        queue: Arc<LocalQueue>,
        repo: InMemoryRepository,
        store: InMemoryObjectStore,
    ) -> (ConsumerPool, SledStateStore) {
        let catalog = Arc::new(EntityCatalog::from_settings([EntitySettings::new("order")]));
        let registry = RepositoryRegistry::new().with("order", Arc::new(repo));
        let options = DumpOptions {
            microservice: "oms".into(),
            bucket: "lake".into(),
            ..DumpOptions::default()
        };
        let engine = Arc::new(StreamDumpEngine::new(registry, Arc::new(store), catalog, options));
        let state = SledStateStore::temporary().unwrap();
        let pool = ConsumerPool::new(
            queue,
            engine,
            Arc::new(state.clone()),
            PoolSettings {
                max_concurrency: 2,
                max_receive_count: 2,
                redelivery_delay: Duration::from_millis(5),
            },
        );
        (pool, state)
    }

    async fn publish(queue: &LocalQueue, id: &str, body: serde_json::Value) {
        let report = queue
            .publish_batch(
                "sync",
                vec![OutboundMessage {
                    id: MessageId::new(id),
                    client_code: ClientCode::from("acme"),
                    body,
                }],
            )
            .await
            .unwrap();
        assert!(report.is_success());
    }

    fn window_body() -> serde_json::Value {
        let window = WindowMessage::new(&"order".into(), LoadType::Initial, ts(1), ts(2));
        serde_json::to_value(window).unwrap()
    }

    #[tokio::test]
    async fn drains_valid_and_malformed_messages() {
        let repo = InMemoryRepository::default();
        repo.insert(&ClientCode::from("acme"), row(1)).await;
        let store = InMemoryObjectStore::default();
        let (queue, pool, _state) = setup(repo, store.clone());

        publish(&queue, "ok", window_body()).await;
        publish(&queue, "bad", json!({ "entity": "order" })).await;

        let stats = pool.drain().await.unwrap();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.dead_lettered, 0);
        assert_eq!(store.keys("lake").await.len(), 1);
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn failing_message_is_redelivered_then_dead_lettered() {
        let repo = InMemoryRepository::new().failing_after(0);
        repo.insert(&ClientCode::from("acme"), row(1)).await;
        let (queue, pool, state) = setup(repo, InMemoryObjectStore::default());

        publish(&queue, "doomed", window_body()).await;

        let stats = pool.drain().await.unwrap();
        assert_eq!(stats.redelivered, 1);
        assert_eq!(stats.dead_lettered, 1);

        let letters = DeadLetterStore::list(&state).await.unwrap();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].message_id, "doomed");
        assert_eq!(letters[0].receive_count, 2);
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn consumes_while_a_producer_waits_for_room() {
        let queue = Arc::new(LocalQueue::new("sync", 1).with_publish_timeout(Duration::from_secs(5)));
        let (pool, _state) = pool_for(Arc::clone(&queue), InMemoryRepository::default(), InMemoryObjectStore::default());

        let (published, stats) = pool
            .consume_during(async {
                for i in 0..5 {
                    publish(&queue, &format!("m{i}"), window_body()).await;
                }
                5
            })
            .await
            .unwrap();

        assert_eq!(published, 5);
        assert_eq!(stats.completed, 5);
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let (_queue, pool, _state) = setup(InMemoryRepository::default(), InMemoryObjectStore::default());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move { pool.run(cancel).await }
        });

        cancel.cancel();
        let stats = handle.await.unwrap().unwrap();
        assert_eq!(stats, PoolStats::default());
    }
}
