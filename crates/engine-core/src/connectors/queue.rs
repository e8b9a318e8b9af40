use crate::error::QueueError;
use async_trait::async_trait;
use model::core::identifiers::{ClientCode, MessageId};
use serde::{Deserialize, Serialize};

/// Message handed to the outbound queue; `body` is the serialized window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub id: MessageId,
    pub client_code: ClientCode,
    pub body: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PublishOutcome {
    Accepted,
    Rejected { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishResult {
    pub id: MessageId,
    #[serde(flatten)]
    pub outcome: PublishOutcome,
}

/// Per-message outcome of a batch publish.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReport {
    pub failed_count: usize,
    pub results: Vec<PublishResult>,
}

impl PublishReport {
    pub fn from_results(results: Vec<PublishResult>) -> Self {
        let failed_count = results
            .iter()
            .filter(|r| matches!(r.outcome, PublishOutcome::Rejected { .. }))
            .count();
        PublishReport {
            failed_count,
            results,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed_count == 0
    }
}

#[async_trait]
pub trait OutboundQueue: Send + Sync {
    async fn publish_batch(
        &self,
        destination: &str,
        messages: Vec<OutboundMessage>,
    ) -> Result<PublishReport, QueueError>;
}

/// One inbound delivery of a queued message. `receive_count` starts at 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub message_id: MessageId,
    pub client_code: ClientCode,
    pub body: serde_json::Value,
    pub receive_count: u32,
}

impl Delivery {
    pub fn first(message: OutboundMessage) -> Self {
        Delivery {
            message_id: message.id,
            client_code: message.client_code,
            body: message.body,
            receive_count: 1,
        }
    }

    pub fn redelivered(mut self) -> Self {
        self.receive_count += 1;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts_rejections() {
        let report = PublishReport::from_results(vec![
            PublishResult {
                id: MessageId::new("a"),
                outcome: PublishOutcome::Accepted,
            },
            PublishResult {
                id: MessageId::new("b"),
                outcome: PublishOutcome::Rejected {
                    reason: "full".into(),
                },
            },
        ]);
        assert_eq!(report.failed_count, 1);
        assert!(!report.is_success());
        assert!(PublishReport::default().is_success());
    }
}
