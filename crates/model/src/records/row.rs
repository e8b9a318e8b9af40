use serde_json::{Map, Value};
use thiserror::Error;

/// A source row as read from the operational store.
pub type Row = Map<String, Value>;

/// Field every normalized record exposes its identifier under.
pub const ID_FIELD: &str = "id";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("Row has no identifier field '{0}'")]
    Missing(String),
}

/// Moves the store-native identifier (`_id` and friends) to `id` as a string
/// and drops the native field.
pub fn normalize_identifier(mut row: Row, native_field: &str) -> Result<Row, IdentifierError> {
    let native = match row.remove(native_field) {
        Some(Value::Null) | None => return Err(IdentifierError::Missing(native_field.to_string())),
        Some(value) => value,
    };

    let id = match native {
        Value::String(s) => s,
        // ObjectId-like documents serialized as {"$oid": "..."}
        Value::Object(ref obj) if obj.len() == 1 && obj.contains_key("$oid") => match &obj["$oid"] {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
        other => other.to_string(),
    };

    row.insert(ID_FIELD.to_string(), Value::String(id));
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn renames_native_identifier() {
        let out = normalize_identifier(row(json!({ "_id": "abc", "total": 10 })), "_id").unwrap();
        assert_eq!(Value::Object(out), json!({ "id": "abc", "total": 10 }));
    }

    #[test]
    fn stringifies_numeric_and_oid_identifiers() {
        let out = normalize_identifier(row(json!({ "_id": 42 })), "_id").unwrap();
        assert_eq!(out["id"], json!("42"));

        let out = normalize_identifier(row(json!({ "_id": { "$oid": "65f0" } })), "_id").unwrap();
        assert_eq!(out["id"], json!("65f0"));
    }

    #[test]
    fn replaces_existing_id_field() {
        let out = normalize_identifier(row(json!({ "_id": "n", "id": "stale" })), "_id").unwrap();
        assert_eq!(out["id"], json!("n"));
        assert!(!out.contains_key("_id"));
    }

    #[test]
    fn missing_identifier_is_an_error() {
        let err = normalize_identifier(row(json!({ "total": 1 })), "_id").unwrap_err();
        assert_eq!(err, IdentifierError::Missing("_id".into()));
    }
}
