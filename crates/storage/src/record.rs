//! Journal record format.
//!
//! # Record Layout
//!
//! ```text
//! ┌─────────────────┬──────────────────┬─────────────────────────┬──────────┐
//! │ Length (4 bytes)│ Format Ver (1)   │ Payload (variable)      │ CRC32 (4)│
//! └─────────────────┴──────────────────┴─────────────────────────┴──────────┘
//! ```
//!
//! The length field covers format version + payload + CRC. The payload is a
//! MessagePack-encoded [`JournalRecord`]. Every record describes one item
//! (or one provider stamp), so replay is transactional per item.

use crc32fast::Hasher;
use launchdex_core::{ChangeStamp, ItemId, ProviderId, SearchItem};
use serde::{Deserialize, Serialize};

/// Current journal record format version
pub const RECORD_FORMAT_VERSION: u8 = 1;

/// Bytes taken by the length prefix
const LENGTH_PREFIX: usize = 4;

/// Minimum framed body: format version + CRC
const MIN_BODY: usize = 1 + 4;

/// Upper bound on a single record body. Anything larger is treated as a
/// corrupt length prefix rather than an allocation request.
pub const MAX_RECORD_BODY: usize = 16 * 1024 * 1024;

/// One durable change to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalRecord {
    /// Full item insert or replace
    Upsert(SearchItem),
    /// Item re-reported under a newer scan stamp, nothing else changed
    Stamp {
        /// Item being re-stamped
        id: ItemId,
        /// New change stamp
        change_stamp: ChangeStamp,
    },
    /// Item removed
    Delete {
        /// Removed item
        id: ItemId,
    },
    /// Provider's last recorded scan stamp
    ProviderStamp {
        /// Provider
        provider: ProviderId,
        /// Recorded stamp
        stamp: ChangeStamp,
    },
}

impl JournalRecord {
    /// Serialize record to framed bytes.
    ///
    /// Format: length (4) + format_version (1) + payload + crc32 (4)
    pub fn to_bytes(&self) -> Result<Vec<u8>, RecordError> {
        let encoded =
            rmp_serde::to_vec(self).map_err(|e| RecordError::Encode(e.to_string()))?;

        let mut payload = Vec::with_capacity(1 + encoded.len());
        payload.push(RECORD_FORMAT_VERSION);
        payload.extend_from_slice(&encoded);

        let crc = compute_crc(&payload);

        let total_len = payload.len() + 4;
        let mut record = Vec::with_capacity(LENGTH_PREFIX + total_len);
        record.extend_from_slice(&(total_len as u32).to_le_bytes());
        record.extend_from_slice(&payload);
        record.extend_from_slice(&crc.to_le_bytes());
        Ok(record)
    }

    /// Deserialize a record from the front of `bytes`.
    ///
    /// Returns (record, bytes_consumed) on success.
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, usize), RecordError> {
        let length = read_length(bytes)?;
        if bytes.len() < LENGTH_PREFIX + length {
            return Err(RecordError::InsufficientData);
        }

        let body = &bytes[LENGTH_PREFIX..LENGTH_PREFIX + length];
        let (payload, crc_bytes) = body.split_at(length - 4);
        let stored_crc = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        let computed_crc = compute_crc(payload);
        if computed_crc != stored_crc {
            return Err(RecordError::ChecksumMismatch {
                expected: stored_crc,
                computed: computed_crc,
            });
        }

        let format_version = payload[0];
        if format_version != RECORD_FORMAT_VERSION {
            return Err(RecordError::UnsupportedVersion(format_version));
        }

        let record: JournalRecord = rmp_serde::from_slice(&payload[1..])
            .map_err(|e| RecordError::Decode(e.to_string()))?;
        Ok((record, LENGTH_PREFIX + length))
    }
}

fn read_length(bytes: &[u8]) -> Result<usize, RecordError> {
    if bytes.len() < LENGTH_PREFIX {
        return Err(RecordError::InsufficientData);
    }
    let length = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    if !(MIN_BODY..=MAX_RECORD_BODY).contains(&length) {
        return Err(RecordError::InvalidFormat);
    }
    Ok(length)
}

fn compute_crc(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Journal record parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// Not enough data to parse record (torn write)
    #[error("Insufficient data to parse record")]
    InsufficientData,

    /// Length prefix is out of range
    #[error("Invalid record format")]
    InvalidFormat,

    /// Checksum verification failed
    #[error("Checksum mismatch: expected {expected:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        /// Expected checksum from record
        expected: u32,
        /// Computed checksum
        computed: u32,
    },

    /// Unsupported format version
    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(u8),

    /// Payload could not be encoded
    #[error("Record encode failed: {0}")]
    Encode(String),

    /// Payload passed the checksum but did not decode
    #[error("Record decode failed: {0}")]
    Decode(String),
}

impl From<RecordError> for launchdex_core::Error {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::Encode(msg) => launchdex_core::Error::Serialization(msg),
            other => launchdex_core::Error::Corruption(other.to_string()),
        }
    }
}
