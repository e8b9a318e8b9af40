use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engine_core::{
    connectors::source::{EntityRepository, RecordQuery, RowStream, SortOrder},
    error::RepositoryError,
};
use futures_util::stream;
use model::{
    core::{identifiers::ClientCode, time::parse_timestamp},
    records::row::Row,
};
use serde_json::Value;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;

/// Rows of one entity kept in memory, grouped per tenant.
///
/// Filtering and ordering follow the same rules as the SQL repository so it
/// can stand in for it in tests and dry runs.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    rows: Arc<RwLock<HashMap<ClientCode, Vec<Row>>>>,
    fail_after: Option<usize>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every cursor yield an error after `rows` rows.
    pub fn failing_after(mut self, rows: usize) -> Self {
        self.fail_after = Some(rows);
        self
    }

    pub async fn insert(&self, client: &ClientCode, row: Row) {
        self.rows
            .write()
            .await
            .entry(client.clone())
            .or_default()
            .push(row);
    }

    pub async fn extend(&self, client: &ClientCode, rows: impl IntoIterator<Item = Row>) {
        self.rows
            .write()
            .await
            .entry(client.clone())
            .or_default()
            .extend(rows);
    }
}

fn timestamp_of(row: &Row, field: &str) -> Option<DateTime<Utc>> {
    match row.get(field)? {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn project(row: Row, fields: &[String], id_field: &str) -> Row {
    row.into_iter()
        .filter(|(k, _)| k == id_field || fields.iter().any(|f| f == k))
        .collect()
}

#[async_trait]
impl EntityRepository for InMemoryRepository {
    async fn query_stream(
        &self,
        client: &ClientCode,
        query: &RecordQuery,
    ) -> Result<RowStream, RepositoryError> {
        let mut matching: Vec<Row> = self
            .rows
            .read()
            .await
            .get(client)
            .map(|rows| {
                rows.iter()
                    .filter(|row| {
                        timestamp_of(row, query.date_field)
                            .is_some_and(|ts| ts >= query.from && ts <= query.to)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        matching.sort_by_key(|row| timestamp_of(row, query.order_by));
        if query.order == SortOrder::Desc {
            matching.reverse();
        }

        let id_field = self.id_field().to_string();
        let mut items: Vec<Result<Row, RepositoryError>> = matching
            .into_iter()
            .map(|row| match &query.fields {
                Some(fields) => Ok(project(row, fields, &id_field)),
                None => Ok(row),
            })
            .collect();

        if let Some(limit) = self.fail_after {
            items.truncate(limit);
            items.push(Err(RepositoryError::Query("cursor interrupted".to_string())));
        }

        Ok(Box::pin(stream::iter(items)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use engine_core::connectors::source::DEFAULT_BATCH_SIZE;
    use futures_util::StreamExt;
    use model::{
        core::identifiers::EntityName,
        requests::window::{LoadType, WindowMessage},
    };
    use serde_json::json;

    fn row(id: &str, created: &str, modified: &str) -> Row {
        json!({"_id": id, "dateCreated": created, "dateModified": modified, "status": "new"})
            .as_object()
            .cloned()
            .unwrap()
    }

    fn query(load_type: LoadType, fields: Option<Vec<String>>) -> RecordQuery {
        let window = WindowMessage::new(
            &EntityName::new("order"),
            load_type,
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 1, 1, 23, 59, 59).unwrap(),
        );
        RecordQuery::for_window(&window, fields, DEFAULT_BATCH_SIZE)
    }

    async fn ids(repo: &InMemoryRepository, client: &ClientCode, q: &RecordQuery) -> Vec<String> {
        let rows: Vec<_> = repo.query_stream(client, q).await.unwrap().collect().await;
        rows.into_iter()
            .map(|r| r.unwrap()["_id"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn filters_by_window_and_orders_by_creation() {
        let repo = InMemoryRepository::new();
        let client = ClientCode::from("c1");
        repo.extend(
            &client,
            [
                row("b", "2026-01-01T10:00:00Z", "2026-01-03T00:00:00Z"),
                row("a", "2026-01-01T08:00:00Z", "2026-01-01T09:00:00Z"),
                row("z", "2025-12-31T08:00:00Z", "2026-01-01T12:00:00Z"),
            ],
        )
        .await;
        repo.insert(&ClientCode::from("other"), row("x", "2026-01-01T01:00:00Z", "2026-01-01T01:00:00Z"))
            .await;

        assert_eq!(ids(&repo, &client, &query(LoadType::Initial, None)).await, vec!["a", "b"]);
        assert_eq!(ids(&repo, &client, &query(LoadType::Incremental, None)).await, vec!["z", "a"]);
    }

    #[tokio::test]
    async fn projection_keeps_identifier() {
        let repo = InMemoryRepository::new();
        let client = ClientCode::from("c1");
        repo.insert(&client, row("a", "2026-01-01T08:00:00Z", "2026-01-01T08:00:00Z"))
            .await;

        let q = query(LoadType::Initial, Some(vec!["status".to_string()]));
        let rows: Vec<_> = repo.query_stream(&client, &q).await.unwrap().collect().await;
        let only = rows.into_iter().next().unwrap().unwrap();
        assert_eq!(only.len(), 2);
        assert!(only.contains_key("_id") && only.contains_key("status"));
    }

    #[tokio::test]
    async fn failing_cursor_errors_after_n_rows() {
        let repo = InMemoryRepository::new().failing_after(1);
        let client = ClientCode::from("c1");
        repo.extend(
            &client,
            [
                row("a", "2026-01-01T08:00:00Z", "2026-01-01T08:00:00Z"),
                row("b", "2026-01-01T09:00:00Z", "2026-01-01T09:00:00Z"),
            ],
        )
        .await;

        let rows: Vec<_> = repo
            .query_stream(&client, &query(LoadType::Initial, None))
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(rows.len(), 2);
        assert!(rows[0].is_ok());
        assert!(matches!(rows[1], Err(RepositoryError::Query(_))));
    }
}
