use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message that failed on every allowed delivery.
///
/// `body` keeps the raw JSON text so the entry stays readable with any codec.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DeadLetter {
    pub message_id: String,
    pub client_code: String,
    pub body: String,
    pub receive_count: u32,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}
