//! Core data model: item identity, kinds, stamps and the `SearchItem` record.
//!
//! ## Invariants
//!
//! - `SearchItem::tokens` is always `tokenize(title)`. Use [`SearchItem::new`]
//!   or [`SearchItem::set_title`]; never edit `tokens` by hand.
//! - `use_count` never decreases over an item's lifetime.
//! - A `stale` item is never served as a search candidate.

use crate::tokenizer::{tokenize, TokenSet};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// ============================================================================
// Identifiers
// ============================================================================

/// Stable item identifier, unique across the index store.
///
/// Never reused for a semantically different item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Create an id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        ItemId(id.into())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        ItemId(s)
    }
}

impl Borrow<str> for ItemId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Identifies the discovery provider that produced an item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    /// Create a provider id
    pub fn new(id: impl Into<String>) -> Self {
        ProviderId(id.into())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(s: &str) -> Self {
        ProviderId(s.to_string())
    }
}

impl From<String> for ProviderId {
    fn from(s: String) -> Self {
        ProviderId(s)
    }
}

// ============================================================================
// ItemKind
// ============================================================================

/// What kind of launchable unit an item is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// Installed application or shortcut
    App,
    /// Regular file
    File,
    /// Directory
    Folder,
    /// Command payload (shell command, system action)
    Command,
}

impl ItemKind {
    /// All kinds, in canonical order
    pub const ALL: [ItemKind; 4] = [
        ItemKind::App,
        ItemKind::File,
        ItemKind::Folder,
        ItemKind::Command,
    ];

    /// Lowercase name used in config files and CLI output
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::App => "app",
            ItemKind::File => "file",
            ItemKind::Folder => "folder",
            ItemKind::Command => "command",
        }
    }

    /// Parse a kind name, accepting plural forms (`apps`, `files`, ...).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "app" | "apps" => Some(ItemKind::App),
            "file" | "files" => Some(ItemKind::File),
            "folder" | "folders" => Some(ItemKind::Folder),
            "command" | "commands" | "cmd" => Some(ItemKind::Command),
            _ => None,
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ChangeStamp
// ============================================================================

/// Per-provider scan generation marker.
///
/// Monotonically increasing per provider. Used to skip re-scanning and
/// re-tokenizing sources that have not changed since the last recorded scan.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ChangeStamp(u64);

impl ChangeStamp {
    /// The "never scanned" stamp
    pub const ZERO: ChangeStamp = ChangeStamp(0);

    /// Wrap a raw stamp value
    pub const fn new(value: u64) -> Self {
        ChangeStamp(value)
    }

    /// Raw stamp value
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChangeStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Timestamp
// ============================================================================

/// Microsecond-precision timestamp
///
/// Represents a point in time as microseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Unix epoch (1970-01-01 00:00:00 UTC)
    pub const EPOCH: Timestamp = Timestamp(0);

    /// Create a timestamp for the current moment
    ///
    /// Returns epoch (0) if the system clock is before Unix epoch.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(duration.as_micros() as u64)
    }

    /// Create a timestamp from microseconds since epoch
    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        Timestamp(micros)
    }

    /// Create a timestamp from seconds since epoch
    #[inline]
    pub const fn from_secs(secs: u64) -> Self {
        Timestamp(secs.saturating_mul(1_000_000))
    }

    /// Get microseconds since Unix epoch
    #[inline]
    pub const fn as_micros(&self) -> u64 {
        self.0
    }

    /// Get seconds since Unix epoch (truncates)
    #[inline]
    pub const fn as_secs(&self) -> u64 {
        self.0 / 1_000_000
    }

    /// Compute duration since an earlier timestamp
    ///
    /// Returns `None` if `earlier` is actually later than `self`.
    pub fn duration_since(&self, earlier: Timestamp) -> Option<Duration> {
        if self.0 >= earlier.0 {
            Some(Duration::from_micros(self.0 - earlier.0))
        } else {
            None
        }
    }

    /// Add a duration, saturating at the maximum
    pub fn saturating_add(&self, duration: Duration) -> Self {
        Timestamp(self.0.saturating_add(duration.as_micros() as u64))
    }

    /// Subtract a duration, saturating at epoch
    pub fn saturating_sub(&self, duration: Duration) -> Self {
        Timestamp(self.0.saturating_sub(duration.as_micros() as u64))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.0 / 1_000_000, self.0 % 1_000_000)
    }
}

// ============================================================================
// SearchItem
// ============================================================================

/// A discoverable, launchable unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchItem {
    /// Stable identifier
    pub id: ItemId,
    /// What the item is
    pub kind: ItemKind,
    /// Display name
    pub title: String,
    /// Filesystem path or command payload, passed through on launch
    pub path: String,
    /// Normalized tokens derived from `title`
    pub tokens: TokenSet,
    /// Provider that discovered the item
    pub source_provider: ProviderId,
    /// Scan generation the item was last reported in
    pub change_stamp: ChangeStamp,
    /// Most recent successful launch
    pub last_used_at: Option<Timestamp>,
    /// Number of successful launches
    pub use_count: u64,
    /// Excluded from candidates until revalidated or removed
    pub stale: bool,
}

impl SearchItem {
    /// Create a fresh item with derived tokens and no usage history.
    pub fn new(
        id: impl Into<ItemId>,
        kind: ItemKind,
        title: impl Into<String>,
        path: impl Into<String>,
        source_provider: impl Into<ProviderId>,
        change_stamp: ChangeStamp,
    ) -> Self {
        let title = title.into();
        let tokens = tokenize(&title);
        SearchItem {
            id: id.into(),
            kind,
            title,
            path: path.into(),
            tokens,
            source_provider: source_provider.into(),
            change_stamp,
            last_used_at: None,
            use_count: 0,
            stale: false,
        }
    }

    /// Replace the title, re-deriving tokens when it actually changed.
    pub fn set_title(&mut self, title: impl Into<String>) {
        let title = title.into();
        if title != self.title {
            self.tokens = tokenize(&title);
            self.title = title;
        }
    }

    /// True when `tokens` matches `tokenize(title)`.
    pub fn tokens_consistent(&self) -> bool {
        self.tokens == tokenize(&self.title)
    }

    /// Record a successful launch at `at`.
    ///
    /// `last_used_at` never moves backwards.
    pub fn record_use(&mut self, at: Timestamp) {
        self.use_count = self.use_count.saturating_add(1);
        self.last_used_at = Some(match self.last_used_at {
            Some(prev) if prev > at => prev,
            _ => at,
        });
    }

    /// Project into the externally visible result shape.
    pub fn to_hit(&self) -> QueryHit {
        QueryHit {
            id: self.id.clone(),
            kind: self.kind,
            title: self.title.clone(),
            path: self.path.clone(),
        }
    }
}

/// A single search result as delivered to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryHit {
    /// Item identifier, used for launch feedback
    pub id: ItemId,
    /// Item kind
    pub kind: ItemKind,
    /// Display title
    pub title: String,
    /// Launch path or payload
    pub path: String,
}

// ============================================================================
// Launch feedback
// ============================================================================

/// Outcome code reported by the external launch layer on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureCode {
    /// The target no longer exists
    MissingTarget,
    /// The target exists but could not be opened
    AccessDenied,
    /// Any other launcher error code
    Other(i32),
}

impl FailureCode {
    /// Map a raw OS error code from the launcher.
    ///
    /// 2 (file not found) and 3 (path not found) are missing targets,
    /// 5 is access denied.
    pub fn from_os_error(code: i32) -> Self {
        match code {
            2 | 3 => FailureCode::MissingTarget,
            5 => FailureCode::AccessDenied,
            other => FailureCode::Other(other),
        }
    }

    /// True when this failure should prune the item.
    pub fn signals_stale_target(&self) -> bool {
        self.prune_reason().is_some()
    }

    /// The prune this failure triggers, if any.
    pub fn prune_reason(&self) -> Option<PruneReason> {
        match self {
            FailureCode::MissingTarget => Some(PruneReason::MissingTarget),
            FailureCode::AccessDenied => Some(PruneReason::AccessDenied),
            FailureCode::Other(_) => None,
        }
    }
}

/// Why an item is being pruned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PruneReason {
    /// A complete provider scan no longer contains the item
    VanishedAtSource,
    /// A reported deletion was confirmed by reconciliation
    DeletionConfirmed,
    /// Launch failed because the target is gone
    MissingTarget,
    /// Launch failed because the target is inaccessible
    AccessDenied,
    /// The path now lies under an exclusion root
    Excluded,
}

impl PruneReason {
    /// Whether this reason removes the item outright (vs. marking it stale).
    pub fn removes(&self) -> bool {
        !matches!(self, PruneReason::AccessDenied)
    }

    /// Short label for logs
    pub fn as_str(&self) -> &'static str {
        match self {
            PruneReason::VanishedAtSource => "vanished_at_source",
            PruneReason::DeletionConfirmed => "deletion_confirmed",
            PruneReason::MissingTarget => "missing_target",
            PruneReason::AccessDenied => "access_denied",
            PruneReason::Excluded => "excluded",
        }
    }
}
