//! Append-only journal of [`JournalRecord`]s.
//!
//! # File Layout
//!
//! ```text
//! ┌────────────────────────────────────┐
//! │ Header: "LDXJ" + version (8 bytes) │
//! ├────────────────────────────────────┤
//! │ Record 1                           │
//! ├────────────────────────────────────┤
//! │ ...                                │
//! └────────────────────────────────────┘
//! ```
//!
//! On open every complete record is replayed; a torn or corrupt tail is
//! truncated so later appends start on a clean boundary.

use crate::record::{JournalRecord, RecordError};
use launchdex_core::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Magic bytes identifying a journal file: "LDXJ"
pub const JOURNAL_MAGIC: [u8; 4] = *b"LDXJ";

/// Current journal file format version
pub const JOURNAL_FORMAT_VERSION: u32 = 1;

/// Size of the journal header in bytes
pub const JOURNAL_HEADER_SIZE: u64 = 8;

/// Sink for framed journal records.
///
/// The store only updates its in-memory view after `append` (and `sync`,
/// when the durability mode asks for it) returned `Ok`.
pub trait Journal: Send {
    /// Append one framed record.
    ///
    /// On error nothing may be considered written.
    fn append(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Flush appended records to stable storage.
    fn sync(&mut self) -> io::Result<()>;

    /// Discard every record; called once a snapshot has captured them.
    fn reset(&mut self) -> io::Result<()>;
}

/// What was recovered when a journal was opened.
#[derive(Debug, Default)]
pub struct JournalReplay {
    /// Complete records, in append order
    pub records: Vec<JournalRecord>,
    /// Bytes dropped from a torn or corrupt tail
    pub truncated_bytes: u64,
}

// ============================================================================
// FileJournal
// ============================================================================

/// Journal backed by a single file.
pub struct FileJournal {
    file: File,
    path: PathBuf,
    write_position: u64,
}

impl FileJournal {
    /// Open (or create) the journal at `path` and replay its records.
    ///
    /// # Errors
    ///
    /// `Error::Corruption` if the header names a different format or a
    /// record carries an unknown version; `Error::StoreIo` on I/O failure.
    pub fn open(path: &Path) -> Result<(Self, JournalReplay)> {
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        if (bytes.len() as u64) < JOURNAL_HEADER_SIZE {
            // New file, or the header itself was torn.
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&header_bytes())?;
            file.sync_all()?;
            let journal = FileJournal {
                file,
                path: path.to_path_buf(),
                write_position: JOURNAL_HEADER_SIZE,
            };
            return Ok((journal, JournalReplay::default()));
        }

        if bytes[0..4] != JOURNAL_MAGIC {
            return Err(Error::Corruption(format!(
                "'{}' is not a launchdex journal",
                path.display()
            )));
        }
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != JOURNAL_FORMAT_VERSION {
            return Err(Error::Corruption(format!(
                "unsupported journal version {}",
                version
            )));
        }

        let mut replay = JournalReplay::default();
        let mut offset = JOURNAL_HEADER_SIZE as usize;
        while offset < bytes.len() {
            match JournalRecord::from_bytes(&bytes[offset..]) {
                Ok((record, consumed)) => {
                    replay.records.push(record);
                    offset += consumed;
                }
                Err(RecordError::UnsupportedVersion(v)) => {
                    return Err(Error::Corruption(format!(
                        "journal record at offset {} has unsupported version {}",
                        offset, v
                    )));
                }
                Err(e) => {
                    warn!(
                        target: "launchdex::store",
                        path = %path.display(),
                        offset,
                        error = %e,
                        "Truncating torn journal tail"
                    );
                    break;
                }
            }
        }

        let valid_end = offset as u64;
        replay.truncated_bytes = bytes.len() as u64 - valid_end;
        if replay.truncated_bytes > 0 {
            file.set_len(valid_end)?;
            file.sync_all()?;
        }
        file.seek(SeekFrom::Start(valid_end))?;

        let journal = FileJournal {
            file,
            path: path.to_path_buf(),
            write_position: valid_end,
        };
        Ok((journal, replay))
    }

    /// Path of the journal file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current size in bytes, header included
    pub fn size(&self) -> u64 {
        self.write_position
    }
}

impl Journal for FileJournal {
    fn append(&mut self, frame: &[u8]) -> io::Result<()> {
        if let Err(e) = self.file.write_all(frame) {
            // Roll back a partial write so the next append starts clean.
            let _ = self.file.set_len(self.write_position);
            let _ = self.file.seek(SeekFrom::Start(self.write_position));
            return Err(e);
        }
        self.write_position += frame.len() as u64;
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        self.file.sync_data()
    }

    fn reset(&mut self) -> io::Result<()> {
        self.file.set_len(JOURNAL_HEADER_SIZE)?;
        self.file.seek(SeekFrom::Start(JOURNAL_HEADER_SIZE))?;
        self.file.sync_all()?;
        self.write_position = JOURNAL_HEADER_SIZE;
        Ok(())
    }
}

fn header_bytes() -> [u8; JOURNAL_HEADER_SIZE as usize] {
    let mut bytes = [0u8; JOURNAL_HEADER_SIZE as usize];
    bytes[0..4].copy_from_slice(&JOURNAL_MAGIC);
    bytes[4..8].copy_from_slice(&JOURNAL_FORMAT_VERSION.to_le_bytes());
    bytes
}

// ============================================================================
// MemoryJournal
// ============================================================================

/// Shared switch that makes a [`MemoryJournal`] fail its writes.
#[derive(Debug, Clone, Default)]
pub struct FaultSwitch(Arc<AtomicBool>);

impl FaultSwitch {
    /// Create a switch in the healthy state
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn injected failures on or off
    pub fn set_failing(&self, failing: bool) {
        self.0.store(failing, Ordering::SeqCst);
    }

    /// True while writes are being failed
    pub fn is_failing(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// In-memory journal for ephemeral stores and fault-injection tests.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    bytes: Vec<u8>,
    records: usize,
    faults: FaultSwitch,
}

impl MemoryJournal {
    /// Create an empty journal that never fails
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty journal whose writes fail while `faults` is set
    pub fn with_faults(faults: FaultSwitch) -> Self {
        MemoryJournal {
            faults,
            ..Self::default()
        }
    }

    /// Records appended since the last reset
    pub fn record_count(&self) -> usize {
        self.records
    }

    /// Raw framed bytes appended since the last reset
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn check_faults(&self) -> io::Result<()> {
        if self.faults.is_failing() {
            Err(io::Error::new(
                io::ErrorKind::Other,
                "injected journal write failure",
            ))
        } else {
            Ok(())
        }
    }
}

impl Journal for MemoryJournal {
    fn append(&mut self, frame: &[u8]) -> io::Result<()> {
        self.check_faults()?;
        self.bytes.extend_from_slice(frame);
        self.records += 1;
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        self.check_faults()
    }

    fn reset(&mut self) -> io::Result<()> {
        self.bytes.clear();
        self.records = 0;
        Ok(())
    }
}
