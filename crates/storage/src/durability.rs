//! Durability mode for journal writes.

/// Durability mode for journal writes.
///
/// Controls when records are fsynced to disk.
///
/// | Mode | Use Case |
/// |------|----------|
/// | Always | Default; every accepted write survives a crash |
/// | Buffered | Bulk rebuilds; fsync at compaction, `sync()` and close |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// fsync after every record.
    #[default]
    Always,

    /// Leave records in the OS page cache until the next explicit sync.
    ///
    /// A crash may lose the unsynced tail; replay still stops cleanly at
    /// the last complete record.
    Buffered,
}

impl DurabilityMode {
    /// Check if this mode requires fsync on every record.
    pub fn requires_immediate_fsync(&self) -> bool {
        matches!(self, DurabilityMode::Always)
    }

    /// Human-readable description of the mode.
    pub fn description(&self) -> &'static str {
        match self {
            DurabilityMode::Always => "fsync per record (safest)",
            DurabilityMode::Buffered => "fsync at compaction and close (faster bulk writes)",
        }
    }
}
