use crate::error::TransformError;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use model::{
    core::identifiers::ClientCode,
    records::{
        dump::DumpRecord,
        row::{Row, normalize_identifier},
    },
};

/// Turns source rows into NDJSON lines for one dump invocation.
#[derive(Debug, Clone)]
pub struct RecordTransformer {
    client_code: ClientCode,
    id_field: String,
    pushed_at: DateTime<Utc>,
}

impl RecordTransformer {
    pub fn new(client_code: ClientCode, id_field: &str, pushed_at: DateTime<Utc>) -> Self {
        Self {
            client_code,
            id_field: id_field.to_string(),
            pushed_at,
        }
    }

    pub fn to_line(&self, row: Row) -> Result<Bytes, TransformError> {
        let data = normalize_identifier(row, &self.id_field)?;
        let record = DumpRecord::new(self.client_code.as_str(), data, self.pushed_at);
        Ok(Bytes::from(record.to_ndjson_line()?))
    }
}
