//! Append-only record storage

use crate::error::{DocvecError, Result};
use crate::vector::Vector;

/// Identifier assigned by a store. Dense and strictly increasing from 1.
pub type RecordId = u64;

/// A stored document: its id, normalized text and embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: RecordId,
    pub text: String,
    pub vector: Vector,
}

/// Storage backend for vector records.
///
/// `insert` is the only mutator. Implementations assign ids themselves and
/// keep records in ascending id order, so `all_records` can be scanned
/// directly by the ranker.
pub trait RecordStore {
    /// Store a record and return its newly assigned id.
    fn insert(&mut self, text: String, vector: Vector) -> Result<RecordId>;

    /// Every stored record, in ascending id order.
    fn all_records(&self) -> &[VectorRecord];

    /// The fixed vector dimension of this store.
    fn dimension(&self) -> usize;

    /// The number of stored records.
    fn count(&self) -> usize {
        self.all_records().len()
    }

    /// Whether the store holds no records.
    fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

/// In-memory append-only record store.
#[derive(Debug)]
pub struct MemoryStore {
    records: Vec<VectorRecord>,
    /// Next id to assign
    next_id: RecordId,
    /// Enforced vector dimension
    dimension: usize,
}

impl MemoryStore {
    /// Create an empty store that accepts vectors of exactly `dimension` components.
    pub fn new(dimension: usize) -> Self {
        Self {
            records: Vec::new(),
            next_id: 1,
            dimension,
        }
    }

    /// The id the next insert will receive.
    pub fn next_id(&self) -> RecordId {
        self.next_id
    }

    /// Look up a record by id.
    pub fn get(&self, id: RecordId) -> Option<&VectorRecord> {
        self.records
            .binary_search_by_key(&id, |r| r.id)
            .ok()
            .map(|pos| &self.records[pos])
    }

    /// Check a vector against this store's dimension and reject non-finite data.
    pub fn validate(&self, vector: &Vector) -> Result<()> {
        vector.ensure_dimension(self.dimension)?;
        vector.ensure_finite()
    }

    /// Hand out the next id. The id is consumed even if the caller never
    /// pushes a record with it.
    pub(crate) fn reserve_id(&mut self) -> RecordId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Append a record that already carries its id.
    ///
    /// Used for records whose id was reserved earlier and for records
    /// restored from disk. Ids must keep increasing.
    pub(crate) fn push_record(&mut self, record: VectorRecord) -> Result<()> {
        self.validate(&record.vector)?;
        if let Some(last) = self.records.last() {
            if record.id <= last.id {
                return Err(DocvecError::CorruptStore(format!(
                    "record id {} does not follow {}",
                    record.id, last.id
                )));
            }
        }
        self.next_id = self.next_id.max(record.id + 1);
        self.records.push(record);
        Ok(())
    }

    /// Raise the id counter, e.g. to a value recorded in a snapshot.
    pub(crate) fn advance_next_id(&mut self, next_id: RecordId) {
        self.next_id = self.next_id.max(next_id);
    }
}

impl RecordStore for MemoryStore {
    fn insert(&mut self, text: String, vector: Vector) -> Result<RecordId> {
        self.validate(&vector)?;
        let id = self.reserve_id();
        self.push_record(VectorRecord { id, text, vector })?;
        Ok(id)
    }

    fn all_records(&self) -> &[VectorRecord] {
        &self.records
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
