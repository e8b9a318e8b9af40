use crate::records::row::Row;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One NDJSON line of a data-lake part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DumpRecord {
    pub uid: Uuid,
    pub client_code: String,
    pub data: Row,
    /// Shared by every record and part of one dump invocation.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub pushed_at: DateTime<Utc>,
}

impl DumpRecord {
    pub fn new(client_code: &str, data: Row, pushed_at: DateTime<Utc>) -> Self {
        DumpRecord {
            uid: Uuid::new_v4(),
            client_code: client_code.to_string(),
            data,
            pushed_at,
        }
    }

    /// Serialized record followed by `\n`.
    pub fn to_ndjson_line(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn ndjson_line_shape() {
        let pushed_at = Utc.timestamp_millis_opt(1_767_225_600_000).unwrap();
        let data = json!({ "id": "1" }).as_object().cloned().unwrap();
        let record = DumpRecord::new("acme", data, pushed_at);

        let line = record.to_ndjson_line().unwrap();
        assert_eq!(line.last(), Some(&b'\n'));
        assert_eq!(line.iter().filter(|b| **b == b'\n').count(), 1);

        let parsed: serde_json::Value = serde_json::from_slice(&line).unwrap();
        assert_eq!(parsed["clientCode"], "acme");
        assert_eq!(parsed["pushedAt"], 1_767_225_600_000i64);
        assert_eq!(parsed["data"]["id"], "1");
        assert_eq!(parsed["uid"].as_str().unwrap().len(), 36);
    }
}
