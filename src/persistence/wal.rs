//! Write-Ahead Log (WAL) for crash recovery.
//!
//! Each entry is written as: [length: u32][crc32: u32][payload: bincode(SerializedRecord)]
//! The WAL is append-only and fsynced after each write.

use crate::error::{DocvecError, Result};
use crate::persistence::serialization::{self, SerializedRecord};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

const FRAME_HEADER_SIZE: u64 = 8;

/// Result of scanning the log from the start.
#[derive(Debug)]
pub struct WalReplay {
    pub entries: Vec<SerializedRecord>,
    /// Byte length of the prefix made of complete, checksummed frames.
    pub valid_len: u64,
    /// Byte length of the file when it was scanned.
    pub file_len: u64,
}

impl WalReplay {
    /// Whether the log ends in a truncated or corrupted frame.
    pub fn has_torn_tail(&self) -> bool {
        self.valid_len < self.file_len
    }
}

/// Write-Ahead Log file manager.
#[derive(Debug)]
pub struct WriteAheadLog {
    path: PathBuf,
    file: File,
    /// Length of the log up to the last fully written frame.
    committed_len: u64,
}

impl WriteAheadLog {
    /// Open (or create) a WAL file at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        let committed_len = file.metadata()?.len();
        Ok(Self {
            path,
            file,
            committed_len,
        })
    }

    /// Append an entry to the WAL and fsync.
    ///
    /// If the write fails part-way the file is cut back to the last
    /// committed frame so later appends stay readable.
    pub fn append(&mut self, entry: &SerializedRecord) -> Result<()> {
        let payload = serialization::to_bincode(entry)?;
        let len = u32::try_from(payload.len()).map_err(|_| {
            DocvecError::Serialization(format!("WAL entry too large: {} bytes", payload.len()))
        })?;
        let crc = crc32fast::hash(&payload);

        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE as usize + payload.len());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&payload);

        if let Err(e) = self.write_frame(&frame) {
            if let Err(rollback) = self.file.set_len(self.committed_len) {
                tracing::error!(
                    path = %self.path.display(),
                    error = %rollback,
                    "failed to roll back partial WAL write"
                );
            }
            return Err(e);
        }

        self.committed_len += frame.len() as u64;
        Ok(())
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.file.write_all(frame)?;
        self.file.sync_data()?;
        Ok(())
    }

    /// Replay all valid entries from the WAL.
    /// Stops at the first corrupted or incomplete entry (crash tolerance).
    pub fn replay(&self) -> Result<WalReplay> {
        let file = File::open(&self.path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let mut entries = Vec::new();
        let mut valid_len = 0u64;

        loop {
            let mut header = [0u8; FRAME_HEADER_SIZE as usize];
            match reader.read_exact(&mut header) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(DocvecError::StorageUnavailable(e)),
            }
            let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as u64;
            let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

            // A length past the end of the file can only be a torn header.
            if valid_len + FRAME_HEADER_SIZE + len > file_len {
                break;
            }

            let mut payload = vec![0u8; len as usize];
            if reader.read_exact(&mut payload).is_err() {
                break;
            }

            if crc32fast::hash(&payload) != expected_crc {
                break;
            }

            match serialization::from_bincode::<SerializedRecord>(&payload) {
                Ok(entry) => entries.push(entry),
                Err(_) => break,
            }
            valid_len += FRAME_HEADER_SIZE + len;
        }

        Ok(WalReplay {
            entries,
            valid_len,
            file_len,
        })
    }

    /// Cut the log back to `len` bytes, dropping everything after it.
    pub fn truncate_to(&mut self, len: u64) -> Result<()> {
        self.file.set_len(len)?;
        self.file.sync_all()?;
        self.committed_len = len;
        Ok(())
    }

    /// Truncate the WAL file (after a successful checkpoint).
    pub fn truncate(&mut self) -> Result<()> {
        self.truncate_to(0)
    }

    /// Length of the log in bytes.
    pub fn len(&self) -> u64 {
        self.committed_len
    }

    pub fn is_empty(&self) -> bool {
        self.committed_len == 0
    }
}
