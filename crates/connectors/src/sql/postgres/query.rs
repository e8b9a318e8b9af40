use crate::{error::ConnectorError, sql::postgres::utils::quote_ident};
use engine_core::connectors::source::RecordQuery;

/// Table backing an entity: `order-item` lives in `order_item`.
pub fn table_name(entity: &str) -> String {
    entity.replace('-', "_")
}

/// A window select and how many rows each round trip pulls from its portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorPlan {
    pub sql: String,
    pub fetch_size: i32,
}

pub fn cursor_plan(
    schema: &str,
    client_column: &str,
    id_column: &str,
    query: &RecordQuery,
) -> Result<CursorPlan, ConnectorError> {
    Ok(CursorPlan {
        sql: select_window(schema, client_column, id_column, query)?,
        fetch_size: i32::try_from(query.batch_size.max(1)).unwrap_or(i32::MAX),
    })
}

/// Builds the window select. Every row comes back as a single JSON text
/// column; parameters are `$1` client code, `$2` from, `$3` to.
pub fn select_window(
    schema: &str,
    client_column: &str,
    id_column: &str,
    query: &RecordQuery,
) -> Result<String, ConnectorError> {
    let table = quote_ident(&table_name(query.entity.as_str()))?;
    let schema = quote_ident(schema)?;
    let client_column = quote_ident(client_column)?;
    let date_field = quote_ident(query.date_field)?;
    let order_by = quote_ident(query.order_by)?;

    let projection = match &query.fields {
        None => "to_jsonb(t)::text".to_string(),
        Some(fields) => {
            let mut pairs = Vec::with_capacity(fields.len() + 1);
            pairs.push(format!("'{id_column}', t.{}", quote_ident(id_column)?));
            for field in fields.iter().filter(|f| f.as_str() != id_column) {
                pairs.push(format!("'{field}', t.{}", quote_ident(field)?));
            }
            format!("jsonb_build_object({})::text", pairs.join(", "))
        }
    };

    Ok(format!(
        "SELECT {projection} FROM {schema}.{table} t \
         WHERE t.{client_column} = $1 AND t.{date_field} >= $2 AND t.{date_field} <= $3 \
         ORDER BY t.{order_by} {}",
        query.order
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use engine_core::connectors::source::DEFAULT_BATCH_SIZE;
    use model::{
        core::identifiers::EntityName,
        requests::window::{LoadType, WindowMessage},
    };

    fn window(load_type: LoadType) -> WindowMessage {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2026, 1, 1, 23, 59, 59).unwrap();
        WindowMessage::new(&EntityName::new("Order Item"), load_type, from, to)
    }

    fn query(load_type: LoadType, fields: Option<Vec<String>>) -> RecordQuery {
        RecordQuery::for_window(&window(load_type), fields, DEFAULT_BATCH_SIZE)
    }

    #[test]
    fn window_limit_sets_the_fetch_size() {
        let limited = window(LoadType::Initial).with_limits(Some(50), None);
        let plan = cursor_plan(
            "public",
            "clientCode",
            "_id",
            &RecordQuery::for_window(&limited, None, DEFAULT_BATCH_SIZE),
        )
        .unwrap();
        assert_eq!(plan.fetch_size, 50);

        let default = cursor_plan("public", "clientCode", "_id", &query(LoadType::Initial, None)).unwrap();
        assert_eq!(default.fetch_size, 1000);

        let mut huge = query(LoadType::Initial, None);
        huge.batch_size = usize::MAX;
        let clamped = cursor_plan("public", "clientCode", "_id", &huge).unwrap();
        assert_eq!(clamped.fetch_size, i32::MAX);
    }

    #[test]
    fn selects_whole_row_as_json() {
        let sql = select_window("public", "clientCode", "_id", &query(LoadType::Initial, None)).unwrap();
        assert_eq!(
            sql,
            "SELECT to_jsonb(t)::text FROM \"public\".\"order_item\" t \
             WHERE t.\"clientCode\" = $1 AND t.\"dateCreated\" >= $2 AND t.\"dateCreated\" <= $3 \
             ORDER BY t.\"dateCreated\" ASC"
        );
    }

    #[test]
    fn projection_always_keeps_identifier() {
        let fields = Some(vec!["status".to_string(), "_id".to_string()]);
        let sql = select_window("public", "clientCode", "_id", &query(LoadType::Incremental, fields)).unwrap();
        assert!(sql.starts_with("SELECT jsonb_build_object('_id', t.\"_id\", 'status', t.\"status\")::text"));
        assert!(sql.contains("t.\"dateModified\" >= $2"));
    }

    #[test]
    fn rejects_unsafe_field_names() {
        let fields = Some(vec!["a'b".to_string()]);
        assert!(select_window("public", "clientCode", "_id", &query(LoadType::Initial, fields)).is_err());
    }
}
