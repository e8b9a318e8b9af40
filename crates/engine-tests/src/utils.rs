#![allow(dead_code)]

use crate::BUCKET;
use chrono::{DateTime, TimeZone, Utc};
use connectors::InMemoryObjectStore;
use flate2::read::GzDecoder;
use model::{core::time::iso_millis, records::row::Row};
use serde_json::{Value, json};
use std::{collections::BTreeMap, io::Read};

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

/// An order row created and modified at `when`, padded with `payload_len` bytes.
pub fn order(id: usize, when: DateTime<Utc>, payload_len: usize) -> Row {
    let stamp = iso_millis(&when);
    json!({
        "_id": format!("order-{id:05}"),
        "dateCreated": stamp,
        "dateModified": stamp,
        "status": "invoiced",
        "payload": "x".repeat(payload_len),
    })
    .as_object()
    .cloned()
    .unwrap()
}

/// One order per hour starting at `start`.
pub fn hourly_orders(count: usize, start: DateTime<Utc>, payload_len: usize) -> Vec<Row> {
    (0..count)
        .map(|i| order(i, start + chrono::Duration::hours(i as i64), payload_len))
        .collect()
}

/// Decompressed NDJSON records of one stored part.
pub async fn read_part(store: &InMemoryObjectStore, key: &str) -> Vec<Value> {
    let object = store
        .get(BUCKET, key)
        .await
        .unwrap_or_else(|| panic!("missing object {key}"));
    assert_eq!(object.content_type, "application/gzip");

    let mut text = String::new();
    GzDecoder::new(&object.data[..])
        .read_to_string(&mut text)
        .expect("valid gzip");
    text.lines()
        .map(|line| serde_json::from_str(line).expect("valid ndjson line"))
        .collect()
}

/// Every stored record, grouped by object key.
pub async fn read_all(store: &InMemoryObjectStore) -> BTreeMap<String, Vec<Value>> {
    let mut parts = BTreeMap::new();
    for key in store.keys(BUCKET).await {
        let records = read_part(store, &key).await;
        parts.insert(key, records);
    }
    parts
}

/// `data.id` of every record, sorted.
pub fn record_ids<'a>(records: impl IntoIterator<Item = &'a Value>) -> Vec<String> {
    let mut ids: Vec<String> = records
        .into_iter()
        .filter_map(|r| r["data"]["id"].as_str().map(str::to_string))
        .collect();
    ids.sort();
    ids
}
