//! Serialization utilities: bincode for records and snapshots, JSON for the manifest.

use crate::error::{DocvecError, Result};
use crate::storage::{RecordId, VectorRecord};
use crate::vector::Vector;
use serde::{Deserialize, Serialize};

/// Version of the on-disk layout, recorded in the manifest.
pub const FORMAT_VERSION: u32 = 1;

/// Serializable representation of a stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedRecord {
    pub id: RecordId,
    pub text: String,
    pub data: Vec<f32>,
}

impl SerializedRecord {
    pub fn from_record(record: &VectorRecord) -> Self {
        Self {
            id: record.id,
            text: record.text.clone(),
            data: record.vector.as_slice().to_vec(),
        }
    }

    pub fn into_record(self) -> VectorRecord {
        VectorRecord {
            id: self.id,
            text: self.text,
            vector: Vector::new(self.data),
        }
    }
}

/// Serializable representation of the full store state.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub dimension: usize,
    pub next_id: RecordId,
    pub records: Vec<SerializedRecord>,
}

/// Human-readable summary written next to the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub dimension: usize,
    pub record_count: usize,
    pub next_id: RecordId,
}

/// Encode data to bincode bytes.
pub fn to_bincode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| DocvecError::Serialization(e.to_string()))
}

/// Decode data from bincode bytes. Undecodable bytes mean the store is corrupt.
pub fn from_bincode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| DocvecError::CorruptStore(e.to_string()))
}

/// Encode data to pretty-printed JSON bytes.
pub fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|e| DocvecError::Serialization(e.to_string()))
}

/// Decode data from JSON bytes.
pub fn from_json<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| DocvecError::CorruptStore(e.to_string()))
}
