use crate::{
    error::ConnectorError,
    sql::postgres::{
        query::{CursorPlan, cursor_plan},
        utils::connect_client,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engine_core::{
    connectors::source::{EntityRepository, RecordQuery, RowStream},
    error::RepositoryError,
};
use model::{core::identifiers::ClientCode, records::row::Row};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_postgres::{Client, types::ToSql};
use tracing::debug;

/// Where entity tables live and which columns carry identity and tenancy.
#[derive(Debug, Clone)]
pub struct PgSourceOptions {
    pub schema: String,
    pub id_column: String,
    pub client_column: String,
}

impl Default for PgSourceOptions {
    fn default() -> Self {
        Self {
            schema: "public".to_string(),
            id_column: "_id".to_string(),
            client_column: "clientCode".to_string(),
        }
    }
}

/// Entity repository over a Postgres table, one table per entity.
///
/// Every stream runs on its own connection inside a read-only transaction,
/// fetching `batch_size` rows per round trip from a bound portal.
#[derive(Clone)]
pub struct PgRepository {
    url: Arc<str>,
    options: PgSourceOptions,
}

impl PgRepository {
    pub async fn connect(url: &str) -> Result<Client, ConnectorError> {
        connect_client(url).await
    }

    pub fn new(url: impl Into<Arc<str>>, options: PgSourceOptions) -> Self {
        Self {
            url: url.into(),
            options,
        }
    }
}

#[async_trait]
impl EntityRepository for PgRepository {
    fn id_field(&self) -> &str {
        &self.options.id_column
    }

    async fn query_stream(
        &self,
        client: &ClientCode,
        query: &RecordQuery,
    ) -> Result<RowStream, RepositoryError> {
        let plan = cursor_plan(
            &self.options.schema,
            &self.options.client_column,
            &self.options.id_column,
            query,
        )?;
        debug!(entity = %query.entity, client_code = %client, batch = plan.fetch_size, sql = %plan.sql, "Opening cursor");

        let connection = connect_client(&self.url).await?;
        let (tx, rx) = mpsc::channel(plan.fetch_size.clamp(1, 4096) as usize);
        let cursor = Cursor {
            code: client.to_string(),
            from: query.from,
            to: query.to,
            plan,
        };
        tokio::spawn(async move {
            if let Err(err) = cursor.run(connection, &tx).await {
                let _ = tx.send(Err(err)).await;
            }
        });

        let stream = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(Box::pin(stream))
    }
}

struct Cursor {
    code: String,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    plan: CursorPlan,
}

impl Cursor {
    async fn run(
        self,
        mut connection: Client,
        tx: &mpsc::Sender<Result<Row, RepositoryError>>,
    ) -> Result<(), RepositoryError> {
        let transaction = connection
            .build_transaction()
            .read_only(true)
            .start()
            .await
            .map_err(ConnectorError::from)?;

        let params: [&(dyn ToSql + Sync); 3] = [&self.code, &self.from, &self.to];
        let portal = transaction
            .bind(self.plan.sql.as_str(), &params)
            .await
            .map_err(ConnectorError::from)?;

        loop {
            let rows = transaction
                .query_portal(&portal, self.plan.fetch_size)
                .await
                .map_err(ConnectorError::from)?;
            let fetched = rows.len();

            for row in rows {
                let decoded = decode(&row);
                let failed = decoded.is_err();
                // Receiver gone means the dump stopped; the transaction rolls back on drop.
                if tx.send(decoded).await.is_err() || failed {
                    return Ok(());
                }
            }

            if fetched < self.plan.fetch_size as usize {
                break;
            }
        }

        transaction.commit().await.map_err(ConnectorError::from)?;
        Ok(())
    }
}

fn decode(row: &tokio_postgres::Row) -> Result<Row, RepositoryError> {
    let text: String = row
        .try_get(0)
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    serde_json::from_str::<Row>(&text).map_err(|e| RepositoryError::Decode(e.to_string()))
}
