use async_trait::async_trait;
use engine_core::{
    connectors::queue::{
        Delivery, OutboundMessage, OutboundQueue, PublishOutcome, PublishReport, PublishResult,
    },
    error::QueueError,
};
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

/// In-process work queue between the load coordinator and the consumer pool.
///
/// Bounded: a publish that finds the queue full waits up to the publish
/// timeout for a consumer to make room, then rejects that message. Messages
/// count as outstanding from publish until [`LocalQueue::ack`], including
/// while a redelivery is pending.
pub struct LocalQueue {
    name: String,
    publish_timeout: Duration,
    tx: mpsc::Sender<Delivery>,
    rx: Mutex<mpsc::Receiver<Delivery>>,
    outstanding: Arc<AtomicUsize>,
}

impl LocalQueue {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        LocalQueue {
            name: name.into(),
            publish_timeout: Duration::ZERO,
            tx,
            rx: Mutex::new(rx),
            outstanding: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Lets publishes wait for room instead of failing as soon as the queue is full.
    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Waits for the next delivery. `None` once every sender is gone.
    pub async fn receive(&self) -> Option<Delivery> {
        self.rx.lock().await.recv().await
    }

    pub async fn try_receive(&self) -> Option<Delivery> {
        self.rx.lock().await.try_recv().ok()
    }

    /// Puts a failed delivery back after `delay` with its receive count bumped.
    pub fn requeue(&self, delivery: Delivery, delay: Duration) {
        let tx = self.tx.clone();
        let outstanding = Arc::clone(&self.outstanding);
        let delivery = delivery.redelivered();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let id = delivery.message_id.clone();
            if tx.send(delivery).await.is_err() {
                warn!("Queue closed before message {} could be redelivered", id);
                outstanding.fetch_sub(1, Ordering::SeqCst);
            }
        });
    }

    /// Marks one received message as finished.
    pub fn ack(&self) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn is_idle(&self) -> bool {
        self.outstanding() == 0
    }

    async fn send(&self, delivery: Delivery) -> Result<(), &'static str> {
        if self.publish_timeout.is_zero() {
            return self.tx.try_send(delivery).map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => "queue is full",
                mpsc::error::TrySendError::Closed(_) => "queue is closed",
            });
        }
        self.tx
            .send_timeout(delivery, self.publish_timeout)
            .await
            .map_err(|err| match err {
                mpsc::error::SendTimeoutError::Timeout(_) => "queue is full",
                mpsc::error::SendTimeoutError::Closed(_) => "queue is closed",
            })
    }
}

#[async_trait]
impl OutboundQueue for LocalQueue {
    async fn publish_batch(
        &self,
        destination: &str,
        messages: Vec<OutboundMessage>,
    ) -> Result<PublishReport, QueueError> {
        if destination != self.name {
            return Err(QueueError::UnknownDestination(destination.to_string()));
        }

        let mut results = Vec::with_capacity(messages.len());
        for message in messages {
            let id = message.id.clone();
            // Count before sending so a fast consumer can't ack first.
            self.outstanding.fetch_add(1, Ordering::SeqCst);
            let outcome = match self.send(Delivery::first(message)).await {
                Ok(()) => PublishOutcome::Accepted,
                Err(reason) => {
                    self.outstanding.fetch_sub(1, Ordering::SeqCst);
                    PublishOutcome::Rejected {
                        reason: reason.to_string(),
                    }
                }
            };
            results.push(PublishResult { id, outcome });
        }

        let report = PublishReport::from_results(results);
        debug!(
            "Published {} message(s) to {} ({} rejected)",
            report.results.len(),
            self.name,
            report.failed_count
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::identifiers::{ClientCode, MessageId};
    use serde_json::json;

    fn message(id: &str) -> OutboundMessage {
        OutboundMessage {
            id: MessageId::new(id),
            client_code: ClientCode::from("acme"),
            body: json!({ "entity": "order" }),
        }
    }

    #[tokio::test]
    async fn rejects_messages_beyond_capacity() {
        let queue = LocalQueue::new("sync", 2);
        let report = queue
            .publish_batch("sync", vec![message("a"), message("b"), message("c")])
            .await
            .unwrap();

        assert_eq!(report.failed_count, 1);
        assert_eq!(
            report.results[2].outcome,
            PublishOutcome::Rejected {
                reason: "queue is full".into()
            }
        );
        assert_eq!(queue.outstanding(), 2);
    }

    #[tokio::test]
    async fn publish_waits_for_a_consumer_to_make_room() {
        let queue = Arc::new(LocalQueue::new("sync", 1).with_publish_timeout(Duration::from_secs(5)));
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                let mut seen = Vec::new();
                while seen.len() < 3 {
                    let delivery = queue.receive().await.unwrap();
                    seen.push(delivery.message_id.to_string());
                    queue.ack();
                }
                seen
            })
        };

        let report = queue
            .publish_batch("sync", vec![message("a"), message("b"), message("c")])
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(consumer.await.unwrap(), vec!["a", "b", "c"]);
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn publish_rejects_after_waiting_out_the_timeout() {
        let queue = LocalQueue::new("sync", 1).with_publish_timeout(Duration::from_millis(20));
        let report = queue
            .publish_batch("sync", vec![message("a"), message("b")])
            .await
            .unwrap();

        assert_eq!(report.failed_count, 1);
        assert_eq!(
            report.results[1].outcome,
            PublishOutcome::Rejected {
                reason: "queue is full".into()
            }
        );
        assert_eq!(queue.outstanding(), 1);
    }

    #[tokio::test]
    async fn unknown_destination_is_an_error() {
        let queue = LocalQueue::new("sync", 2);
        let err = queue
            .publish_batch("elsewhere", vec![message("a")])
            .await
            .unwrap_err();
        assert_eq!(err, QueueError::UnknownDestination("elsewhere".into()));
    }

    #[tokio::test]
    async fn requeue_bumps_receive_count() {
        let queue = LocalQueue::new("sync", 4);
        queue.publish_batch("sync", vec![message("a")]).await.unwrap();

        let first = queue.try_receive().await.unwrap();
        assert_eq!(first.receive_count, 1);
        assert!(queue.try_receive().await.is_none());

        queue.requeue(first, Duration::from_millis(5));
        let second = queue.receive().await.unwrap();
        assert_eq!(second.receive_count, 2);
        assert_eq!(second.message_id, MessageId::new("a"));

        assert!(!queue.is_idle());
        queue.ack();
        assert!(queue.is_idle());
    }
}
