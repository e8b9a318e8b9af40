pub mod local_fs;
pub mod memory;

use bytes::Bytes;
use engine_core::{connectors::destination::CompletedChunk, error::ObjectStoreError};
use std::collections::BTreeMap;

/// Checks the completion list against what was uploaded and returns chunk
/// numbers in order.
pub(crate) fn ordered_chunk_numbers(
    uploaded: &BTreeMap<u32, Bytes>,
    completed: &[CompletedChunk],
) -> Result<Vec<u32>, ObjectStoreError> {
    if completed.is_empty() {
        return Err(ObjectStoreError::Rejected(
            "multipart upload completed without chunks".to_string(),
        ));
    }

    let mut numbers = Vec::with_capacity(completed.len());
    for chunk in completed {
        if !uploaded.contains_key(&chunk.chunk_number) {
            return Err(ObjectStoreError::Rejected(format!(
                "chunk {} was never uploaded",
                chunk.chunk_number
            )));
        }
        if numbers.last().is_some_and(|last| *last >= chunk.chunk_number) {
            return Err(ObjectStoreError::Rejected(
                "chunks must be listed in ascending order".to_string(),
            ));
        }
        numbers.push(chunk.chunk_number);
    }
    Ok(numbers)
}

pub(crate) fn etag(chunk_number: u32, data: &[u8]) -> String {
    format!("\"{chunk_number}-{}\"", data.len())
}
