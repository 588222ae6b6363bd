//! Durable record store: an in-memory store rebuilt from snapshot + WAL on open.

use crate::error::{DocvecError, Result};
use crate::persistence::serialization::{Manifest, SerializedRecord, StoreSnapshot, FORMAT_VERSION};
use crate::persistence::snapshot::{SnapshotManager, MANIFEST_FILE};
use crate::persistence::wal::WriteAheadLog;
use crate::storage::{MemoryStore, RecordId, RecordStore, VectorRecord};
use crate::vector::Vector;
use std::io;
use std::path::{Path, PathBuf};

/// Configuration for the storage engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Vector dimension every record must have.
    pub dimension: usize,
    /// Checkpoint after this many WAL entries.
    pub checkpoint_interval: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dimension: 1536,
            checkpoint_interval: 1000,
        }
    }
}

/// Persistent record store: an in-memory `MemoryStore` backed by WAL + snapshot.
///
/// The data directory holds `wal.log`, `snapshot.bin` and `manifest.json`.
/// Every insert is fsynced to the WAL before it becomes visible in memory.
///
/// The manifest describes the store as of the last checkpoint: its
/// `record_count` leaves out records that are only in the WAL. Its `next_id`
/// is also raised whenever a failed append burns an id, so burned ids stay
/// unused across restarts.
#[derive(Debug)]
pub struct DurableStore {
    memory: MemoryStore,
    wal: WriteAheadLog,
    snapshot_mgr: SnapshotManager,
    manifest: Manifest,
    data_dir: PathBuf,
    wal_count: usize,
    config: EngineConfig,
}

impl DurableStore {
    /// Open or create a persistent store at the given directory.
    pub fn open(data_dir: impl AsRef<Path>, config: EngineConfig) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;

        let snapshot_mgr = SnapshotManager::new(&data_dir)?;
        let manifest = match snapshot_mgr.load_manifest()? {
            Some(manifest) => {
                check_dimension(config.dimension, manifest.dimension)?;
                manifest
            }
            None => {
                let manifest = Manifest {
                    format_version: FORMAT_VERSION,
                    dimension: config.dimension,
                    record_count: 0,
                    next_id: 1,
                };
                snapshot_mgr.save_manifest(&manifest)?;
                manifest
            }
        };

        let mut memory = MemoryStore::new(config.dimension);

        // Snapshot first, then the WAL entries written after it.
        if let Some(snapshot) = snapshot_mgr.load()? {
            check_dimension(config.dimension, snapshot.dimension)?;
            for record in snapshot.records {
                memory.push_record(record.into_record())?;
            }
            memory.advance_next_id(snapshot.next_id);
        }

        let mut wal = WriteAheadLog::open(data_dir.join("wal.log"))?;
        let replay = wal.replay()?;
        if replay.has_torn_tail() {
            tracing::warn!(
                valid_bytes = replay.valid_len,
                file_bytes = replay.file_len,
                "discarding torn tail of write-ahead log"
            );
            wal.truncate_to(replay.valid_len)?;
        }

        let wal_count = replay.entries.len();
        for entry in replay.entries {
            // Entries already folded into the snapshot (crash between
            // snapshot write and WAL truncate) are skipped.
            if entry.id < memory.next_id() {
                continue;
            }
            memory.push_record(entry.into_record())?;
        }
        // Must come after replay: the skip rule above compares against the
        // snapshot's counter, not the high-water mark.
        memory.advance_next_id(manifest.next_id);

        tracing::info!(
            data_dir = %data_dir.display(),
            records = memory.count(),
            dimension = config.dimension,
            "opened record store"
        );

        Ok(Self {
            memory,
            wal,
            snapshot_mgr,
            manifest,
            data_dir,
            wal_count,
            config,
        })
    }

    /// Open a store that already exists, creating nothing when it does not.
    pub fn open_existing(data_dir: impl AsRef<Path>, config: EngineConfig) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        if !data_dir.join(MANIFEST_FILE).is_file() {
            return Err(DocvecError::StorageUnavailable(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no record store at {}", data_dir.display()),
            )));
        }
        Self::open(data_dir, config)
    }

    /// The id the next successful insert will receive.
    pub fn next_id(&self) -> RecordId {
        self.memory.next_id()
    }

    /// Look up a record by id.
    pub fn get(&self, id: RecordId) -> Option<&VectorRecord> {
        self.memory.get(id)
    }

    /// Directory holding the store's files.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Force a checkpoint: snapshot + truncate WAL.
    pub fn checkpoint(&mut self) -> Result<()> {
        let snapshot = self.build_snapshot();
        self.manifest = self.snapshot_mgr.save(&snapshot)?;

        self.wal.truncate()?;
        self.wal_count = 0;

        tracing::info!(records = snapshot.records.len(), "checkpoint written");
        Ok(())
    }

    /// Checkpoint once the WAL holds `checkpoint_interval` entries.
    fn maybe_checkpoint(&mut self) {
        if self.wal_count < self.config.checkpoint_interval {
            return;
        }
        // The triggering insert is already durable in the WAL, so a failed
        // checkpoint is retried on the next insert instead of failing this one.
        if let Err(e) = self.checkpoint() {
            tracing::warn!(error = %e, "checkpoint failed; write-ahead log retained");
        }
    }

    /// Persist the raised id counter after an append failed past id assignment.
    fn record_burned_id(&mut self) {
        self.manifest.next_id = self.memory.next_id();
        if let Err(e) = self.snapshot_mgr.save_manifest(&self.manifest) {
            tracing::warn!(
                next_id = self.manifest.next_id,
                error = %e,
                "could not persist id high-water mark"
            );
        }
    }

    /// Build a snapshot from current store state.
    fn build_snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            dimension: self.config.dimension,
            next_id: self.memory.next_id(),
            records: self
                .memory
                .all_records()
                .iter()
                .map(SerializedRecord::from_record)
                .collect(),
        }
    }
}

impl RecordStore for DurableStore {
    /// Insert a record, writing to WAL first.
    fn insert(&mut self, text: String, vector: Vector) -> Result<RecordId> {
        self.memory.validate(&vector)?;
        let id = self.memory.reserve_id();

        let entry = SerializedRecord {
            id,
            text,
            data: vector.as_slice().to_vec(),
        };
        if let Err(e) = self.wal.append(&entry) {
            tracing::warn!(id, error = %e, "insert failed after id assignment");
            self.record_burned_id();
            return Err(e);
        }

        self.memory.push_record(VectorRecord {
            id,
            text: entry.text,
            vector,
        })?;
        self.wal_count += 1;
        tracing::debug!(id, "record inserted");

        self.maybe_checkpoint();
        Ok(id)
    }

    fn all_records(&self) -> &[VectorRecord] {
        self.memory.all_records()
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

fn check_dimension(configured: usize, persisted: usize) -> Result<()> {
    if configured != persisted {
        return Err(DocvecError::DimensionMismatch {
            expected: persisted,
            actual: configured,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(checkpoint_interval: usize) -> EngineConfig {
        EngineConfig {
            dimension: 2,
            checkpoint_interval,
        }
    }

    fn ids(store: &DurableStore) -> Vec<RecordId> {
        store.all_records().iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_engine_insert_is_immediately_visible() {
        let dir = TempDir::new().unwrap();
        let mut store = DurableStore::open(dir.path().join("db"), config(100)).unwrap();

        let id = store
            .insert("first".to_string(), Vector::new(vec![1.0, 0.0]))
            .unwrap();
        assert_eq!(id, 1);
        assert_eq!(store.get(1).unwrap().text, "first");
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_engine_wal_recovery() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("db");

        {
            let mut store = DurableStore::open(&db_path, config(10000)).unwrap();
            for i in 0..3 {
                store
                    .insert(format!("doc {}", i), Vector::new(vec![i as f32, 1.0]))
                    .unwrap();
            }
            assert_eq!(store.count(), 3);
        }

        // Reopen, recovering from the WAL alone
        let mut store = DurableStore::open(&db_path, config(10000)).unwrap();
        assert_eq!(ids(&store), vec![1, 2, 3]);
        assert_eq!(store.get(2).unwrap().text, "doc 1");

        let next = store
            .insert("doc 3".to_string(), Vector::new(vec![3.0, 1.0]))
            .unwrap();
        assert_eq!(next, 4);
    }

    #[test]
    fn test_engine_checkpoint_and_recovery() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("db");

        {
            let mut store = DurableStore::open(&db_path, config(2)).unwrap();
            store.insert("a".into(), Vector::new(vec![1.0, 0.0])).unwrap();
            // The second insert triggers a checkpoint.
            store.insert("b".into(), Vector::new(vec![0.0, 1.0])).unwrap();
            store.insert("c".into(), Vector::new(vec![1.0, 1.0])).unwrap();
            assert_eq!(store.count(), 3);
        }
        assert!(db_path.join("snapshot.bin").exists());

        // Reopen, recovering from snapshot + WAL
        let store = DurableStore::open(&db_path, config(10000)).unwrap();
        assert_eq!(ids(&store), vec![1, 2, 3]);
        assert_eq!(store.get(3).unwrap().vector.as_slice(), &[1.0, 1.0]);
    }

    #[test]
    fn test_engine_replay_skips_entries_covered_by_snapshot() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("db");

        {
            let mut store = DurableStore::open(&db_path, config(10000)).unwrap();
            store.insert("a".into(), Vector::new(vec![1.0, 0.0])).unwrap();
            store.insert("b".into(), Vector::new(vec![0.0, 1.0])).unwrap();
            let wal_before = std::fs::read(db_path.join("wal.log")).unwrap();
            store.checkpoint().unwrap();
            // Simulate a crash after the snapshot but before the WAL truncate.
            std::fs::write(db_path.join("wal.log"), wal_before).unwrap();
        }

        let store = DurableStore::open(&db_path, config(10000)).unwrap();
        assert_eq!(ids(&store), vec![1, 2]);
    }

    #[test]
    fn test_engine_recovers_from_torn_wal_tail() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("db");

        {
            let mut store = DurableStore::open(&db_path, config(10000)).unwrap();
            store.insert("a".into(), Vector::new(vec![1.0, 0.0])).unwrap();
        }
        {
            use std::io::Write;
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(db_path.join("wal.log"))
                .unwrap();
            file.write_all(&[0x10, 0x00, 0x00]).unwrap();
        }

        {
            let mut store = DurableStore::open(&db_path, config(10000)).unwrap();
            assert_eq!(store.count(), 1);
            store.insert("b".into(), Vector::new(vec![0.0, 1.0])).unwrap();
        }

        let store = DurableStore::open(&db_path, config(10000)).unwrap();
        assert_eq!(ids(&store), vec![1, 2]);
    }

    /// Replace the WAL with a device that rejects every write.
    #[cfg(target_os = "linux")]
    fn point_wal_at_full_device(db_path: &Path) {
        let wal = db_path.join("wal.log");
        std::fs::remove_file(&wal).unwrap();
        std::os::unix::fs::symlink("/dev/full", &wal).unwrap();
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_engine_failed_append_burns_id_across_restart() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("db");

        {
            let mut store = DurableStore::open(&db_path, config(10000)).unwrap();
            store.insert("a".into(), Vector::new(vec![1.0, 0.0])).unwrap();
            store.checkpoint().unwrap();
        }
        point_wal_at_full_device(&db_path);

        {
            let mut store = DurableStore::open(&db_path, config(10000)).unwrap();
            let result = store.insert("b".into(), Vector::new(vec![0.0, 1.0]));
            assert!(matches!(result, Err(DocvecError::StorageUnavailable(_))));
            assert_eq!(store.count(), 1);
            assert_eq!(store.next_id(), 3);

            assert!(store.insert("c".into(), Vector::new(vec![1.0, 1.0])).is_err());
            assert_eq!(ids(&store), vec![1]);
            assert_eq!(store.next_id(), 4);
        }

        // Back on a writable WAL, ids 2 and 3 stay burned.
        std::fs::remove_file(db_path.join("wal.log")).unwrap();
        {
            let mut store = DurableStore::open(&db_path, config(10000)).unwrap();
            assert_eq!(ids(&store), vec![1]);
            let id = store.insert("d".into(), Vector::new(vec![0.5, 0.5])).unwrap();
            assert_eq!(id, 4);
        }

        let store = DurableStore::open(&db_path, config(10000)).unwrap();
        assert_eq!(ids(&store), vec![1, 4]);
        assert_eq!(store.next_id(), 5);
    }

    #[test]
    fn test_open_existing_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("missing");

        assert!(matches!(
            DurableStore::open_existing(&db_path, config(100)),
            Err(DocvecError::StorageUnavailable(_))
        ));
        assert!(!db_path.exists());

        DurableStore::open(&db_path, config(100)).unwrap();
        assert!(DurableStore::open_existing(&db_path, config(100)).is_ok());
    }

    #[test]
    fn test_manifest_tracks_last_checkpoint() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("db");
        let manifest = || {
            SnapshotManager::new(&db_path)
                .unwrap()
                .load_manifest()
                .unwrap()
                .unwrap()
        };

        let mut store = DurableStore::open(&db_path, config(10000)).unwrap();
        store.insert("a".into(), Vector::new(vec![1.0, 0.0])).unwrap();
        store.insert("b".into(), Vector::new(vec![0.0, 1.0])).unwrap();
        assert_eq!(manifest().record_count, 0);
        assert_eq!(manifest().next_id, 1);

        store.checkpoint().unwrap();
        assert_eq!(manifest().record_count, 2);
        assert_eq!(manifest().next_id, 3);
    }

    #[test]
    fn test_engine_rejects_wrong_dimension() {
        let dir = TempDir::new().unwrap();
        let mut store = DurableStore::open(dir.path(), config(100)).unwrap();

        let result = store.insert("bad".into(), Vector::new(vec![1.0, 2.0, 3.0]));
        assert!(matches!(result, Err(DocvecError::DimensionMismatch { .. })));
        assert_eq!(store.count(), 0);
        assert_eq!(store.insert("ok".into(), Vector::new(vec![1.0, 2.0])).unwrap(), 1);
    }

    #[test]
    fn test_engine_reopen_with_different_dimension_fails() {
        let dir = TempDir::new().unwrap();
        {
            DurableStore::open(dir.path(), config(100)).unwrap();
        }

        let other = EngineConfig {
            dimension: 3,
            checkpoint_interval: 100,
        };
        assert!(matches!(
            DurableStore::open(dir.path(), other),
            Err(DocvecError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_engine_1000_records_recovery() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("db");

        {
            let mut store = DurableStore::open(&db_path, config(500)).unwrap();
            for i in 0..1000 {
                store
                    .insert(format!("doc {}", i), Vector::new(vec![i as f32, (i * 2) as f32]))
                    .unwrap();
            }
            assert_eq!(store.count(), 1000);
        }

        let store = DurableStore::open(&db_path, config(10000)).unwrap();
        assert_eq!(store.count(), 1000);
        assert_eq!(ids(&store), (1..=1000).collect::<Vec<RecordId>>());
    }
}
