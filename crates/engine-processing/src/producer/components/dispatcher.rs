use crate::error::DispatchError;
use engine_core::connectors::queue::{
    OutboundMessage, OutboundQueue, PublishOutcome, PublishReport,
};
use model::{core::identifiers::ClientCode, requests::window::WindowMessage};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Largest number of window messages sent in one publish call.
pub const MAX_BATCH_SIZE: usize = 50;

/// Hands window batches to the outbound queue. A batch counts as sent only
/// when every message in it was accepted; nothing is retried here.
#[derive(Clone)]
pub struct BatchDispatcher {
    queue: Arc<dyn OutboundQueue>,
    destination: String,
}

impl BatchDispatcher {
    pub fn new(queue: Arc<dyn OutboundQueue>, destination: impl Into<String>) -> Self {
        Self {
            queue,
            destination: destination.into(),
        }
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// `true` iff the queue accepted every message of the batch.
    pub async fn dispatch(&self, client: &ClientCode, windows: &[WindowMessage]) -> bool {
        match self.try_dispatch(client, windows).await {
            Ok(report) if report.is_success() => true,
            Ok(report) => {
                for result in &report.results {
                    if let PublishOutcome::Rejected { reason } = &result.outcome {
                        warn!(client_code = %client, message_id = %result.id, %reason, "Message rejected by queue");
                    }
                }
                error!(
                    client_code = %client,
                    failed = report.failed_count,
                    messages = windows.len(),
                    "Queue rejected part of the batch"
                );
                false
            }
            Err(err) => {
                error!(client_code = %client, messages = windows.len(), error = %err, "Failed to publish batch");
                false
            }
        }
    }

    pub async fn try_dispatch(
        &self,
        client: &ClientCode,
        windows: &[WindowMessage],
    ) -> Result<PublishReport, DispatchError> {
        if windows.len() > MAX_BATCH_SIZE {
            return Err(DispatchError::BatchTooLarge {
                size: windows.len(),
                max: MAX_BATCH_SIZE,
            });
        }
        if windows.is_empty() {
            return Ok(PublishReport::default());
        }

        let messages = windows
            .iter()
            .map(|window| {
                Ok(OutboundMessage {
                    id: window.message_id(client),
                    client_code: client.clone(),
                    body: serde_json::to_value(window)?,
                })
            })
            .collect::<Result<Vec<_>, serde_json::Error>>()?;

        debug!(
            client_code = %client,
            destination = %self.destination,
            messages = messages.len(),
            batch = %batch_id(&messages),
            "Publishing window batch"
        );

        let report = self.queue.publish_batch(&self.destination, messages).await?;
        // A queue answering with fewer results than messages is a partial failure.
        if report.results.len() != windows.len() && report.is_success() {
            return Ok(PublishReport {
                failed_count: windows.len().saturating_sub(report.results.len()),
                results: report.results,
            });
        }
        Ok(report)
    }
}

/// Short digest of the message ids, used to correlate log lines.
fn batch_id(messages: &[OutboundMessage]) -> String {
    let mut hasher = blake3::Hasher::new();
    for message in messages {
        hasher.update(message.id.as_str().as_bytes());
    }
    format!("batch-{}", &hasher.finalize().to_hex()[..12])
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use engine_core::{
        connectors::queue::PublishResult,
        error::QueueError,
    };
    use model::{core::identifiers::EntityName, requests::window::LoadType};
    use tokio::sync::Mutex;

    /// Queue double that records every batch and can reject selected calls.
    #[derive(Default)]
    pub(crate) struct RecordingQueue {
        pub batches: Mutex<Vec<Vec<OutboundMessage>>>,
        /// Zero-based publish calls whose first message is rejected.
        pub reject_calls: Vec<usize>,
        pub transport_down: bool,
    }

    #[async_trait]
    impl OutboundQueue for RecordingQueue {
        async fn publish_batch(
            &self,
            _destination: &str,
            messages: Vec<OutboundMessage>,
        ) -> Result<PublishReport, QueueError> {
            if self.transport_down {
                return Err(QueueError::Transport("connection refused".into()));
            }
            let mut batches = self.batches.lock().await;
            let call = batches.len();
            let results = messages
                .iter()
                .enumerate()
                .map(|(i, m)| PublishResult {
                    id: m.id.clone(),
                    outcome: if i == 0 && self.reject_calls.contains(&call) {
                        PublishOutcome::Rejected {
                            reason: "throttled".into(),
                        }
                    } else {
                        PublishOutcome::Accepted
                    },
                })
                .collect();
            batches.push(messages);
            Ok(PublishReport::from_results(results))
        }
    }

    fn windows(n: u32) -> Vec<WindowMessage> {
        (0..n)
            .map(|d| {
                let from = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::days(d.into());
                WindowMessage::new(&EntityName::new("order"), LoadType::Initial, from, from + chrono::Duration::hours(23))
            })
            .collect()
    }

    #[tokio::test]
    async fn accepted_batch_reports_success() {
        let queue = Arc::new(RecordingQueue::default());
        let dispatcher = BatchDispatcher::new(queue.clone(), "sync-queue");
        let client = ClientCode::from("c1");

        assert!(dispatcher.dispatch(&client, &windows(3)).await);

        let batches = queue.batches.lock().await;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 3);
        assert_eq!(batches[0][0].client_code, client);
        assert_eq!(batches[0][0].body["entity"], "order");
        assert_eq!(batches[0][0].id, windows(1)[0].message_id(&client));
    }

    #[tokio::test]
    async fn partial_rejection_fails_the_batch() {
        let queue = Arc::new(RecordingQueue {
            reject_calls: vec![0],
            ..Default::default()
        });
        let dispatcher = BatchDispatcher::new(queue, "sync-queue");
        assert!(!dispatcher.dispatch(&ClientCode::from("c1"), &windows(2)).await);
    }

    #[tokio::test]
    async fn transport_failure_is_a_failed_dispatch() {
        let queue = Arc::new(RecordingQueue {
            transport_down: true,
            ..Default::default()
        });
        let dispatcher = BatchDispatcher::new(queue, "sync-queue");
        assert!(!dispatcher.dispatch(&ClientCode::from("c1"), &windows(1)).await);
    }

    #[tokio::test]
    async fn oversized_batches_are_refused() {
        let queue = Arc::new(RecordingQueue::default());
        let dispatcher = BatchDispatcher::new(queue.clone(), "sync-queue");
        let err = dispatcher
            .try_dispatch(&ClientCode::from("c1"), &windows(51))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::BatchTooLarge { size: 51, max: 50 }));
        assert!(queue.batches.lock().await.is_empty());
    }
}
