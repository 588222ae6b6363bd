//! Snapshot: save/load full store state to/from disk.

use crate::error::Result;
use crate::persistence::serialization::{self, Manifest, StoreSnapshot, FORMAT_VERSION};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

const SNAPSHOT_FILE: &str = "snapshot.bin";
pub(crate) const MANIFEST_FILE: &str = "manifest.json";

/// Manages saving and loading store snapshots and the manifest.
#[derive(Debug)]
pub struct SnapshotManager {
    dir: PathBuf,
}

impl SnapshotManager {
    /// Create a snapshot manager for the given directory.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    /// Save a snapshot and refresh the manifest, returning the manifest written.
    pub fn save(&self, snapshot: &StoreSnapshot) -> Result<Manifest> {
        let data = serialization::to_bincode(snapshot)?;
        write_atomic(&self.snapshot_path(), &data)?;

        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            dimension: snapshot.dimension,
            record_count: snapshot.records.len(),
            next_id: snapshot.next_id,
        };
        self.save_manifest(&manifest)?;
        Ok(manifest)
    }

    /// Write the manifest on its own, e.g. when a store is first created.
    pub fn save_manifest(&self, manifest: &Manifest) -> Result<()> {
        let bytes = serialization::to_json(manifest)?;
        write_atomic(&self.manifest_path(), &bytes)
    }

    /// Load a snapshot from disk, or return None if no snapshot exists.
    pub fn load(&self) -> Result<Option<StoreSnapshot>> {
        let path = self.snapshot_path();
        if !path.exists() {
            return Ok(None);
        }

        let data = fs::read(&path)?;
        let snapshot: StoreSnapshot = serialization::from_bincode(&data)?;
        Ok(Some(snapshot))
    }

    /// Load the manifest, or return None if the store has never been created here.
    pub fn load_manifest(&self) -> Result<Option<Manifest>> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(None);
        }

        let data = fs::read(&path)?;
        Ok(Some(serialization::from_json(&data)?))
    }

    /// Whether a checkpoint has ever been written here.
    pub fn exists(&self) -> bool {
        self.snapshot_path().exists()
    }
}

/// Write to a sibling temp file, fsync, then rename over the target.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
