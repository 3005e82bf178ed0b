//! Compacted store snapshot (`items.snap`).
//!
//! Layout: `LDXS` magic + version (u32 LE) + MessagePack body.
//! Written atomically via temp + fsync + rename.

use launchdex_core::{ChangeStamp, Error, ProviderId, Result, SearchItem};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// Magic bytes for store snapshots
const SNAPSHOT_MAGIC: &[u8; 4] = b"LDXS";
/// Current snapshot version
const SNAPSHOT_VERSION: u32 = 1;

/// Serializable store state.
///
/// Items are sorted by id and stamps by provider so identical state always
/// produces identical bytes.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct SnapshotData {
    pub items: Vec<SearchItem>,
    pub provider_stamps: Vec<(ProviderId, ChangeStamp)>,
}

/// Write snapshot data to a file atomically (temp + rename).
pub(crate) fn write_snapshot(path: &Path, data: &SnapshotData) -> Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)?;

    let payload = rmp_serde::to_vec(data)?;

    let mut buf = Vec::with_capacity(8 + payload.len());
    buf.extend_from_slice(SNAPSHOT_MAGIC);
    buf.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
    buf.extend_from_slice(&payload);

    let tmp_path = path.with_extension("snap.tmp");
    {
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(&buf)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Load snapshot data, or `None` when no snapshot exists yet.
pub(crate) fn load_snapshot(path: &Path) -> Result<Option<SnapshotData>> {
    let buf = match std::fs::read(path) {
        Ok(buf) => buf,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if buf.len() < 8 {
        return Err(Error::Corruption("snapshot too small".to_string()));
    }
    if &buf[0..4] != SNAPSHOT_MAGIC {
        return Err(Error::Corruption("bad snapshot magic".to_string()));
    }
    let version = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
    if version != SNAPSHOT_VERSION {
        return Err(Error::Corruption(format!(
            "unsupported snapshot version {}",
            version
        )));
    }
    let data: SnapshotData = rmp_serde::from_slice(&buf[8..])
        .map_err(|e| Error::Corruption(format!("snapshot decode error: {}", e)))?;
    Ok(Some(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchdex_core::ItemKind;

    fn sample() -> SnapshotData {
        SnapshotData {
            items: vec![
                SearchItem::new("a", ItemKind::App, "Alpha", "/a", "p", ChangeStamp::new(1)),
                SearchItem::new("b", ItemKind::File, "Beta.txt", "/b", "p", ChangeStamp::new(1)),
            ],
            provider_stamps: vec![(ProviderId::new("p"), ChangeStamp::new(1))],
        }
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("items.snap");
        write_snapshot(&path, &sample()).unwrap();
        assert_eq!(load_snapshot(&path).unwrap(), Some(sample()));
        assert!(!path.with_extension("snap.tmp").exists());
    }

    #[test]
    fn test_missing_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(load_snapshot(&tmp.path().join("items.snap")).unwrap(), None);
    }

    #[test]
    fn test_bad_magic() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("items.snap");
        std::fs::write(&path, b"XXXX\x01\x00\x00\x00\x90").unwrap();
        assert!(matches!(load_snapshot(&path), Err(Error::Corruption(_))));
    }

    #[test]
    fn test_bad_version() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("items.snap");
        std::fs::write(&path, b"LDXS\x63\x00\x00\x00\x90").unwrap();
        assert!(matches!(load_snapshot(&path), Err(Error::Corruption(_))));
    }

    #[test]
    fn test_same_state_same_bytes() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a.snap");
        let b = tmp.path().join("b.snap");
        write_snapshot(&a, &sample()).unwrap();
        write_snapshot(&b, &sample()).unwrap();
        assert_eq!(std::fs::read(a).unwrap(), std::fs::read(b).unwrap());
    }
}
